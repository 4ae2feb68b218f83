use super::demuxer::{Continuity, DecodedUnit, DemuxRouter, PidRole, Route, Routed};
use super::packet::TsPacket;
use super::psi::{ElementaryStream, Pat, PatEntry, Pmt, PsiSection, TableKind};
use super::types::*;
use crate::error::TsError;
use pretty_assertions::assert_eq;

fn frame(pid: u16, unit_start: bool, counter: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        0x47,                                          // Sync byte
        ((unit_start as u8) << 6) | (pid >> 8) as u8, // PUSI + PID high bits
        pid as u8,                                     // PID low bits
        0x10 | (counter & 0x0F),                       // Payload only + CC
    ];
    frame.extend_from_slice(payload);
    frame.resize(TS_PACKET_SIZE, 0xFF);
    frame
}

fn pat_frame(counter: u8) -> Vec<u8> {
    let pat = Pat {
        programs: vec![
            PatEntry {
                program_number: 0,
                pid: 0x0010,
            },
            PatEntry {
                program_number: 1,
                pid: 0x0100,
            },
        ],
    };
    let section = PsiSection::from_pat(1, pat).encode().unwrap();
    frame(PID_PAT, true, counter, &section)
}

fn pmt_frame(counter: u8) -> Vec<u8> {
    let mut pmt = Pmt::new(1, 0x0101);
    pmt.streams = vec![
        ElementaryStream {
            stream_type: 0x1B,
            pid: 0x0101,
            descriptors: Vec::new(),
        },
        ElementaryStream {
            stream_type: 0x0F,
            pid: 0x0102,
            descriptors: Vec::new(),
        },
    ];
    let section = PsiSection::from_pmt(pmt).encode().unwrap();
    frame(0x0100, true, counter, &section)
}

fn pes_payload() -> Vec<u8> {
    vec![
        0x00, 0x00, 0x01, // Start code
        0xE0, // Video stream 0
        0x00, 0x00, // Unbounded length
        0x80, // Marker bits
        0x80, // PTS only
        0x05, // Header data length
        0x21, 0x00, 0x05, 0xBF, 0x21, // PTS 90000
        0xAA, 0xBB, // Payload
    ]
}

fn feed(router: &mut DemuxRouter, frame: &[u8]) -> Routed {
    router.process(&TsPacket::parse(frame).unwrap())
}

#[test]
fn test_continuity_wraps_without_loss() {
    let mut router = DemuxRouter::new();
    for i in 0..17u8 {
        feed(&mut router, &frame(0x0200, false, i % 16, &[0x00]));
    }
    let stats = &router.stats()[&0x0200];
    assert_eq!(stats.packets, 17);
    assert_eq!(stats.discontinuities, 0);
    assert_eq!(stats.duplicates, 0);
    assert_eq!(stats.last_counter, Some(0));
}

#[test]
fn test_duplicate_then_gap() {
    let mut router = DemuxRouter::new();
    let checks: Vec<Continuity> = [5u8, 5, 7]
        .iter()
        .map(|&cc| feed(&mut router, &frame(0x0200, false, cc, &[0x00])).continuity)
        .collect();
    assert_eq!(
        checks,
        vec![
            Continuity::Initial,
            Continuity::Duplicate,
            Continuity::Discontinuity {
                expected: 6,
                actual: 7
            },
        ]
    );
    let stats = &router.stats()[&0x0200];
    assert_eq!(stats.discontinuities, 1);
    assert_eq!(stats.duplicates, 1);
}

#[test]
fn test_discontinuity_indicator_skips_check() {
    let mut router = DemuxRouter::new();
    feed(&mut router, &frame(0x0200, false, 3, &[0x00]));

    let mut flagged = vec![
        0x47, 0x02, 0x00, // PID 0x200
        0x39, // Adaptation + payload, CC 9
        0x01, // Adaptation field length
        0x80, // Discontinuity indicator
    ];
    flagged.resize(TS_PACKET_SIZE, 0xFF);
    assert_eq!(feed(&mut router, &flagged).continuity, Continuity::Skipped);
    assert_eq!(
        feed(&mut router, &frame(0x0200, false, 10, &[0x00])).continuity,
        Continuity::Ok
    );
    assert_eq!(router.stats()[&0x0200].discontinuities, 0);
}

#[test]
fn test_adaptation_only_frames_keep_counter() {
    let mut router = DemuxRouter::new();
    feed(&mut router, &frame(0x0200, false, 4, &[0x00]));

    let mut adaptation_only = vec![
        0x47, 0x02, 0x00, // PID 0x200
        0x24, // Adaptation only, CC 4
        183,  // Adaptation field length
        0x00, // No flags
    ];
    adaptation_only.resize(TS_PACKET_SIZE, 0xFF);
    assert_eq!(
        feed(&mut router, &adaptation_only).continuity,
        Continuity::Skipped
    );
    assert_eq!(
        feed(&mut router, &frame(0x0200, false, 5, &[0x00])).continuity,
        Continuity::Ok
    );
}

#[test]
fn test_null_pid_never_checked() {
    let mut router = DemuxRouter::new();
    for cc in [0u8, 7, 7, 2] {
        let routed = feed(&mut router, &frame(PID_NULL, true, cc, &[0x00]));
        assert_eq!(routed.continuity, Continuity::Skipped);
        assert!(routed.unit.is_none());
        assert_eq!(routed.route, Route::Drop);
    }
    let stats = &router.stats()[&PID_NULL];
    assert_eq!(stats.packets, 4);
    assert_eq!(stats.discontinuities, 0);
    assert_eq!(stats.role, PidRole::Null);
}

#[test]
fn test_program_discovery_and_routing() {
    let mut router = DemuxRouter::new();

    let routed = feed(&mut router, &pat_frame(0));
    assert_eq!(routed.route, Route::Broadcast);
    match routed.unit {
        Some(Ok(DecodedUnit::Section(section))) => {
            assert_eq!(section.kind(), TableKind::Pat);
            assert_eq!(section.crc_valid(), Some(true));
        }
        other => panic!("expected a PAT section, got {:?}", other),
    }
    assert_eq!(router.role(0x0010), PidRole::Network);
    assert_eq!(router.role(0x0100), PidRole::ProgramMap);
    assert_eq!(router.role(0x0101), PidRole::Unclassified);

    let routed = feed(&mut router, &pmt_frame(0));
    assert_eq!(routed.route, Route::Program(0x0100));
    assert!(matches!(routed.unit, Some(Ok(DecodedUnit::Section(_)))));
    assert_eq!(
        router.role(0x0101),
        PidRole::Elementary {
            program_map_pid: 0x0100
        }
    );
    assert_eq!(router.elementary_pids().get(&0x0102), Some(&0x0100));

    let routed = feed(&mut router, &frame(0x0101, true, 0, &pes_payload()));
    assert_eq!(routed.route, Route::Program(0x0100));
    match routed.unit {
        Some(Ok(DecodedUnit::Pes(pes))) => {
            assert_eq!(pes.stream_id, 0xE0);
            assert_eq!(pes.pts().map(|t| t.value), Some(90_000));
            assert_eq!(pes.dts(), None);
        }
        other => panic!("expected a PES packet, got {:?}", other),
    }

    // Continuation frames are routed but not decoded
    let routed = feed(&mut router, &frame(0x0101, false, 1, &[0x00; 184]));
    assert_eq!(routed.route, Route::Program(0x0100));
    assert!(routed.unit.is_none());
}

#[test]
fn test_classification_is_monotonic() {
    let mut router = DemuxRouter::new();
    feed(&mut router, &pat_frame(0));
    feed(&mut router, &pmt_frame(0));

    // A later PAT naming an elementary PID as a PMT does not reclassify it
    let pat = Pat {
        programs: vec![PatEntry {
            program_number: 2,
            pid: 0x0101,
        }],
    };
    let section = PsiSection::from_pat(1, pat).encode().unwrap();
    feed(&mut router, &frame(PID_PAT, true, 1, &section));

    assert!(!router.program_map_pids().contains(&0x0101));
    assert_eq!(
        router.role(0x0101),
        PidRole::Elementary {
            program_map_pid: 0x0100
        }
    );
}

#[test]
fn test_elementary_before_pmt_is_dropped() {
    let mut router = DemuxRouter::new();
    feed(&mut router, &pat_frame(0));

    let routed = feed(&mut router, &frame(0x0101, false, 0, &[0x00; 184]));
    assert_eq!(routed.route, Route::Drop);
    assert_eq!(router.stats()[&0x0101].role, PidRole::Unclassified);

    feed(&mut router, &pmt_frame(0));
    let routed = feed(&mut router, &frame(0x0101, false, 1, &[0x00; 184]));
    assert_eq!(routed.route, Route::Program(0x0100));
    assert_eq!(routed.continuity, Continuity::Ok);
}

#[test]
fn test_transport_error_counted_not_decoded() {
    let mut router = DemuxRouter::new();
    let mut damaged = pat_frame(0);
    damaged[1] |= 0x80; // Transport error indicator

    let routed = feed(&mut router, &damaged);
    assert!(routed.unit.is_none());
    assert_eq!(routed.route, Route::Broadcast);
    assert_eq!(router.stats()[&PID_PAT].errors, 1);
    assert!(router.program_map_pids().is_empty());
}

#[test]
fn test_reserved_pids_not_decoded() {
    let mut router = DemuxRouter::new();
    let routed = feed(&mut router, &frame(0x0005, true, 0, &[0x00, 0x00, 0xB0]));
    assert!(routed.unit.is_none());
    assert_eq!(router.role(0x0005), PidRole::Reserved);
    assert_eq!(router.role(PID_IPMP), PidRole::Reserved);
}

#[test]
fn test_scrambled_and_malformed_pes() {
    let mut router = DemuxRouter::new();
    feed(&mut router, &pat_frame(0));
    feed(&mut router, &pmt_frame(0));

    let mut scrambled = frame(0x0101, true, 0, &pes_payload());
    scrambled[3] |= 0xC0; // Odd key
    assert!(feed(&mut router, &scrambled).unit.is_none());

    let routed = feed(&mut router, &frame(0x0102, true, 0, &[0x12, 0x34, 0x56, 0x78]));
    assert!(matches!(routed.unit, Some(Err(TsError::InvalidData(_)))));
}

#[test]
fn test_unclassified_pid_decodes_generic_section() {
    let mut router = DemuxRouter::new();
    let payload = [
        0x00, // Pointer field
        0x42, // Table id
        0x30, 0x02, // No syntax, length 2
        0xDE, 0xAD, // Body
    ];
    let routed = feed(&mut router, &frame(0x0300, true, 0, &payload));
    match routed.unit {
        Some(Ok(DecodedUnit::Section(section))) => {
            assert_eq!(section.table_id, 0x42);
            assert_eq!(section.kind(), TableKind::Generic);
            assert_eq!(section.crc32, None);
        }
        other => panic!("expected a generic section, got {:?}", other),
    }
}
