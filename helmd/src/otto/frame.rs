//! frame.rs — controller wire frames
//!
//! Full-duplex ASCII over the serial link. Inbound frames are newline
//! terminated and tagged by their first byte; outbound traffic is
//! register writes plus the boot handshake line.
//!
//! | Tag | Payload          | Meaning                              |
//! |-----|------------------|--------------------------------------|
//! | `$` | `AAAA:WWCC:RRSS` | Alarms, AWA, compass, rudder, sail   |
//! | `@` | `HHHHHH`         | Seconds since controller boot (u24)  |
//! | `!` | `MM`             | Controller mode                      |
//! | `>` | `CVVV`           | Telemetry channel sample (u12)       |
//! | `*` | UTF-8 text       | Debug log line                       |

use thiserror::Error;

use super::registers::Register;

/// Handshake line the core sends until the controller answers.
pub const HANDSHAKE: &str = "@@CQ!";

/// Whether a line acknowledges the handshake.
pub fn is_sync_ack(line: &str) -> bool {
    line.starts_with("+CQOK") || line.starts_with("+OK")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown frame tag {0:?}")]
    UnknownTag(char),
    #[error("malformed {kind} payload {payload:?}")]
    Malformed { kind: &'static str, payload: String },
}

/// One parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `$AAAA:WWCC:RRSS` — emitted at ~1 Hz.
    Status {
        alarms: u16,
        awa: u8,
        compass: u8,
        rudder: u8,
        sail: u8,
    },
    /// `@HHHHHH` — emitted at ~0.25 Hz. A smaller value than previously
    /// seen means the controller rebooted.
    Uptime(u32),
    /// `!MM`
    Mode(u8),
    /// `>CVVV` — high nibble selects the channel, low 12 bits carry the
    /// sample.
    Telemetry { channel: u8, value: u16 },
    /// `*...` — forwarded verbatim to the application log.
    Debug(String),
}

pub fn parse(line: &str) -> Result<Frame, FrameError> {
    let mut chars = line.chars();
    let tag = chars.next().ok_or(FrameError::Empty)?;
    let payload = chars.as_str();
    let malformed = |kind: &'static str| FrameError::Malformed {
        kind,
        payload: payload.to_string(),
    };
    if tag != '*' && !payload.is_ascii() {
        return Err(malformed("frame"));
    }

    match tag {
        '$' => {
            let mut groups = payload.split(':');
            let alarms = groups.next().unwrap_or("");
            let wind = groups.next().ok_or_else(|| malformed("status"))?;
            let helm = groups.next().ok_or_else(|| malformed("status"))?;
            if groups.next().is_some()
                || alarms.len() != 4
                || wind.len() != 4
                || helm.len() != 4
            {
                return Err(malformed("status"));
            }
            let hex =
                |s: &str| u16::from_str_radix(s, 16).map_err(|_| malformed("status"));
            Ok(Frame::Status {
                alarms: hex(alarms)?,
                awa: (hex(&wind[..2])?) as u8,
                compass: (hex(&wind[2..])?) as u8,
                rudder: (hex(&helm[..2])?) as u8,
                sail: (hex(&helm[2..])?) as u8,
            })
        }
        '@' => {
            if payload.is_empty() || payload.len() > 6 {
                return Err(malformed("uptime"));
            }
            u32::from_str_radix(payload, 16)
                .map(|v| Frame::Uptime(v & 0x00FF_FFFF))
                .map_err(|_| malformed("uptime"))
        }
        '!' => u8::from_str_radix(payload, 16)
            .map(Frame::Mode)
            .map_err(|_| malformed("mode")),
        '>' => {
            if payload.len() != 4 {
                return Err(malformed("telemetry"));
            }
            let word =
                u16::from_str_radix(payload, 16).map_err(|_| malformed("telemetry"))?;
            Ok(Frame::Telemetry {
                channel: (word >> 12) as u8,
                value: word & 0x0FFF,
            })
        }
        '*' => Ok(Frame::Debug(payload.to_string())),
        other => Err(FrameError::UnknownTag(other)),
    }
}

/// Format a register write for the wire: `R<dec>=<hex>\r\n`.
pub fn register_write(register: Register, value: u16) -> String {
    format!("R{}={:02X}\r\n", register as u8, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_frame_unpacks_all_groups() {
        let frame = parse("$0003:C040:8033").unwrap();
        assert_eq!(
            frame,
            Frame::Status {
                alarms: 0x0003,
                awa: 0xC0,
                compass: 0x40,
                rudder: 0x80,
                sail: 0x33,
            }
        );
    }

    #[test]
    fn uptime_frame_is_24_bits() {
        assert_eq!(parse("@00012C").unwrap(), Frame::Uptime(300));
        assert_eq!(parse("@FFFFFF").unwrap(), Frame::Uptime(0x00FF_FFFF));
        assert!(parse("@0001234").is_err());
    }

    #[test]
    fn mode_and_telemetry_frames() {
        assert_eq!(parse("!03").unwrap(), Frame::Mode(3));
        assert_eq!(
            parse(">1ABC").unwrap(),
            Frame::Telemetry {
                channel: 1,
                value: 0xABC
            }
        );
        assert_eq!(
            parse(">F000").unwrap(),
            Frame::Telemetry {
                channel: 15,
                value: 0
            }
        );
    }

    #[test]
    fn debug_frame_passes_text_through() {
        assert_eq!(
            parse("*rudder servo centered").unwrap(),
            Frame::Debug("rudder servo centered".into())
        );
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert_eq!(parse(""), Err(FrameError::Empty));
        assert!(matches!(parse("#00"), Err(FrameError::UnknownTag('#'))));
        assert!(parse("$0003:C040").is_err());
        assert!(parse("$zzzz:C040:8033").is_err());
        assert!(parse(">AB").is_err());
        assert!(parse("!xx").is_err());
    }

    #[test]
    fn register_write_wire_format() {
        assert_eq!(register_write(Register::CompassHeading, 0xE0), "R6=E0\r\n");
        assert_eq!(register_write(Register::Mode, 3), "R2=03\r\n");
        assert_eq!(
            register_write(Register::SailMxcUDiv, 0x1234),
            "R22=1234\r\n"
        );
    }

    #[test]
    fn sync_ack_prefixes() {
        assert!(is_sync_ack("+CQOK"));
        assert!(is_sync_ack("+OK ready"));
        assert!(!is_sync_ack("$0000:0000:0000"));
    }
}
