//! Trace file format.
//!
//! Traces are stored as comma-separated text with a mandatory header:
//!
//! ```text
//! Timestamp,UE_ID,Message
//! 1000.123,UE_4,RRC_CONNECTION_REQUEST
//! ```
//!
//! Timestamps are written with exactly three decimals. Neither UE labels
//! nor message names contain commas or quotes, so no quoting is needed.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use cellfed_types::{Event, EventTag, UeId};
use tracing::info;

use crate::error::SimError;

/// The required first line of every trace file.
pub const HEADER: &str = "Timestamp,UE_ID,Message";

/// Write `events` with a header row.
pub fn write_trace<W: Write>(mut writer: W, events: &[Event]) -> Result<(), SimError> {
    writeln!(writer, "{HEADER}")?;
    for event in events {
        writeln!(
            writer,
            "{:.3},{},{}",
            event.timestamp, event.ue_id, event.message
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse a trace, checking the header and every record.
///
/// Blank lines are skipped. UE labels are taken verbatim.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<Event>, SimError> {
    let mut lines = reader.lines();

    let header = lines.next().transpose()?.unwrap_or_default();
    if header.trim() != HEADER {
        return Err(SimError::MissingHeader {
            expected: HEADER,
            found: header,
        });
    }

    let mut events = Vec::new();
    for (offset, line) in lines.enumerate() {
        // Header is line 1.
        let line_no = offset.saturating_add(2);
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(parse_record(&line, line_no)?);
    }
    Ok(events)
}

fn parse_record(line: &str, line_no: usize) -> Result<Event, SimError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [timestamp, ue_id, message] = fields.as_slice() else {
        return Err(SimError::MalformedRecord {
            line: line_no,
            reason: format!("expected 3 fields, found {}", fields.len()),
        });
    };

    let timestamp: f64 = timestamp.parse().map_err(|e| SimError::MalformedRecord {
        line: line_no,
        reason: format!("invalid timestamp `{timestamp}`: {e}"),
    })?;
    if !timestamp.is_finite() {
        return Err(SimError::MalformedRecord {
            line: line_no,
            reason: format!("non-finite timestamp `{timestamp}`"),
        });
    }
    if ue_id.is_empty() {
        return Err(SimError::MalformedRecord {
            line: line_no,
            reason: "empty UE_ID".to_owned(),
        });
    }
    let message: EventTag = message.parse().map_err(|source| SimError::UnknownMessage {
        line: line_no,
        source,
    })?;

    Ok(Event {
        timestamp,
        ue_id: UeId::new(*ue_id),
        message,
    })
}

/// Write a trace to `path`, replacing any existing file.
pub fn save_trace(path: &Path, events: &[Event]) -> Result<(), SimError> {
    let file = File::create(path)?;
    write_trace(BufWriter::new(file), events)?;
    info!(path = %path.display(), events = events.len(), "trace saved");
    Ok(())
}

/// Read a trace from `path`.
pub fn load_trace(path: &Path) -> Result<Vec<Event>, SimError> {
    let file = File::open(path)?;
    read_trace(BufReader::new(file))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<Event> {
        vec![
            Event {
                timestamp: 1000.0456,
                ue_id: UeId::simulated(3),
                message: EventTag::RrcConnectionRequest,
            },
            Event {
                timestamp: 1000.5,
                ue_id: UeId::generated(0),
                message: EventTag::DataTransferDownlink,
            },
        ]
    }

    #[test]
    fn writes_header_and_three_decimal_timestamps() {
        let mut buf = Vec::new();
        write_trace(&mut buf, &sample_events()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Timestamp,UE_ID,Message",
                "1000.046,UE_3,RRC_CONNECTION_REQUEST",
                "1000.500,UE_GEN_0,DATA_TRANSFER_DOWNLINK",
            ]
        );
    }

    #[test]
    fn reads_back_what_it_writes() {
        let mut buf = Vec::new();
        write_trace(&mut buf, &sample_events()).unwrap();
        let events = read_trace(buf.as_slice()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].ue_id.as_str(), "UE_3");
        assert!((events[0].timestamp - 1000.046).abs() < 1e-9);
        assert_eq!(events[1].message, EventTag::DataTransferDownlink);
    }

    #[test]
    fn rejects_missing_header() {
        let input = "1000.000,UE_1,ATTACH_REQUEST\n";
        let err = read_trace(input.as_bytes()).unwrap_err();
        assert!(matches!(err, SimError::MissingHeader { .. }));
    }

    #[test]
    fn rejects_unknown_message_with_line_number() {
        let input = "Timestamp,UE_ID,Message\n1.000,UE_1,ATTACH_REQUEST\n2.000,UE_1,PAGING\n";
        let err = read_trace(input.as_bytes()).unwrap_err();
        match err {
            SimError::UnknownMessage { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_short_records() {
        let input = "Timestamp,UE_ID,Message\n1.000,UE_1\n";
        let err = read_trace(input.as_bytes()).unwrap_err();
        assert!(matches!(err, SimError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn rejects_non_finite_timestamps() {
        for bad in ["NaN", "inf", "-inf"] {
            let input =
                format!("{HEADER}\n1.000,UE_1,AUTH_REQUEST\n{bad},UE_1,AUTH_RESPONSE\n");
            let err = read_trace(input.as_bytes()).unwrap_err();
            assert!(
                matches!(err, SimError::MalformedRecord { line: 3, .. }),
                "{bad} should be rejected, got {err}"
            );
        }
    }

    #[test]
    fn skips_blank_lines() {
        let input = "Timestamp,UE_ID,Message\n\n1.000,UE_1,AUTH_REQUEST\n\n";
        let events = read_trace(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 1);
    }
}
