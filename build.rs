use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Drop a config template next to the target directory for reference
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../tsmarker.template.toml");

    let template = r#"# tsmarker configuration template
# Copy this file to 'tsmarker.toml' next to where you run the tool

# Split every program into its own <pmt_pid>.m2ts file
split = "false"

# Directory receiving the split files
output_dir = "./output"

# Log a progress line every N frames (0 disables)
progress_interval = "10000"

# Check the CRC32 of every decoded PSI section
verify_crc = "false"
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
