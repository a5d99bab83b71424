//! TLS alert protocol.

use mantis_types::{CryptoError, TlsError};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// Alert description codes (RFC 8446 §6, RFC 5246 §7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    RecordOverflow = 22,
    HandshakeFailure = 40,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    UserCanceled = 90,
    NoRenegotiation = 100,
    MissingExtension = 109,
    UnsupportedExtension = 110,
    UnrecognizedName = 112,
    CertificateRequired = 116,
    NoApplicationProtocol = 120,
}

impl AlertLevel {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

impl AlertDescription {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        Ok(match v {
            0 => AlertDescription::CloseNotify,
            10 => AlertDescription::UnexpectedMessage,
            20 => AlertDescription::BadRecordMac,
            22 => AlertDescription::RecordOverflow,
            40 => AlertDescription::HandshakeFailure,
            42 => AlertDescription::BadCertificate,
            43 => AlertDescription::UnsupportedCertificate,
            45 => AlertDescription::CertificateExpired,
            46 => AlertDescription::CertificateUnknown,
            47 => AlertDescription::IllegalParameter,
            48 => AlertDescription::UnknownCa,
            50 => AlertDescription::DecodeError,
            51 => AlertDescription::DecryptError,
            70 => AlertDescription::ProtocolVersion,
            71 => AlertDescription::InsufficientSecurity,
            80 => AlertDescription::InternalError,
            90 => AlertDescription::UserCanceled,
            100 => AlertDescription::NoRenegotiation,
            109 => AlertDescription::MissingExtension,
            110 => AlertDescription::UnsupportedExtension,
            112 => AlertDescription::UnrecognizedName,
            116 => AlertDescription::CertificateRequired,
            120 => AlertDescription::NoApplicationProtocol,
            _ => return Err(v),
        })
    }

    /// The alert to send when a connection fails with `err`.
    ///
    /// `None` means no alert goes out: transport conditions, a peer alert
    /// that already ended the connection, or an exhausted write sequence.
    pub fn for_error(err: &TlsError) -> Option<Self> {
        Some(match err {
            TlsError::InvalidArgument(_) | TlsError::InvalidKeyLength(_) => {
                AlertDescription::InternalError
            }
            TlsError::HandshakeFailure(_) => AlertDescription::HandshakeFailure,
            TlsError::BadRecordMac => AlertDescription::BadRecordMac,
            TlsError::DecryptError => AlertDescription::DecryptError,
            TlsError::BadCertificate(_) => AlertDescription::BadCertificate,
            TlsError::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            TlsError::DecodeError(_) => AlertDescription::DecodeError,
            TlsError::IllegalParameter(_) => AlertDescription::IllegalParameter,
            TlsError::ProtocolVersion => AlertDescription::ProtocolVersion,
            TlsError::RecordOverflow => AlertDescription::RecordOverflow,
            TlsError::Crypto(
                CryptoError::DegenerateSharedSecret
                | CryptoError::EccPointNotOnCurve
                | CryptoError::EccPointAtInfinity
                | CryptoError::EccInvalidPublicKey
                | CryptoError::DhInvalidPublicKey,
            ) => AlertDescription::IllegalParameter,
            TlsError::Crypto(_) | TlsError::Internal(_) => AlertDescription::InternalError,
            TlsError::AlertReceived(_)
            | TlsError::NotReady
            | TlsError::SeqExhausted
            | TlsError::WouldBlock
            | TlsError::Io(_) => return None,
        })
    }
}

/// A TLS alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub const CLOSE_NOTIFY: Alert = Alert::warning(AlertDescription::CloseNotify);

    pub const fn warning(description: AlertDescription) -> Self {
        Alert {
            level: AlertLevel::Warning,
            description,
        }
    }

    pub const fn fatal(description: AlertDescription) -> Self {
        Alert {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.level as u8, self.description as u8]
    }

    /// Decode an alert record body. Unknown descriptions are kept as the
    /// raw byte in the error so the caller can still report them.
    pub fn decode(data: &[u8]) -> Result<Self, TlsError> {
        if data.len() != 2 {
            return Err(TlsError::DecodeError("alert must be two bytes".into()));
        }
        let level = AlertLevel::from_u8(data[0])
            .map_err(|v| TlsError::IllegalParameter(format!("alert level {v}")))?;
        let description = match AlertDescription::from_u8(data[1]) {
            Ok(d) => d,
            // unknown alerts are fatal on receipt
            Err(v) => return Err(TlsError::AlertReceived(v)),
        };
        Ok(Alert { level, description })
    }

    /// close_notify and user_canceled are the only alerts that end a
    /// connection without an error. Every fatal alert, and every warning
    /// other than those and no_renegotiation, is treated as fatal.
    pub fn is_fatal(&self) -> bool {
        match self.description {
            AlertDescription::CloseNotify
            | AlertDescription::UserCanceled
            | AlertDescription::NoRenegotiation => self.level == AlertLevel::Fatal,
            _ => true,
        }
    }

    /// TLS 1.3 keeps only the closure alerts (RFC 8446 §6.1); everything
    /// else, no_renegotiation included, is an error whatever its level.
    pub fn is_fatal_tls13(&self) -> bool {
        match self.description {
            AlertDescription::CloseNotify | AlertDescription::UserCanceled => self.level == AlertLevel::Fatal,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_wire_values() {
        assert_eq!(AlertLevel::Warning as u8, 1);
        assert_eq!(AlertLevel::Fatal as u8, 2);
        assert_eq!(AlertDescription::CloseNotify as u8, 0);
        assert_eq!(AlertDescription::BadRecordMac as u8, 20);
        assert_eq!(AlertDescription::DecryptError as u8, 51);
        assert_eq!(AlertDescription::NoRenegotiation as u8, 100);
        assert_eq!(Alert::CLOSE_NOTIFY.encode(), [1, 0]);
    }

    #[test]
    fn test_decode_roundtrip_and_errors() {
        let a = Alert::fatal(AlertDescription::HandshakeFailure);
        assert_eq!(Alert::decode(&a.encode()).unwrap(), a);
        assert!(matches!(Alert::decode(&[2]), Err(TlsError::DecodeError(_))));
        assert!(matches!(Alert::decode(&[3, 0]), Err(TlsError::IllegalParameter(_))));
        assert_eq!(Alert::decode(&[2, 200]), Err(TlsError::AlertReceived(200)));
    }

    #[test]
    fn test_fatality() {
        assert!(!Alert::CLOSE_NOTIFY.is_fatal());
        assert!(!Alert::warning(AlertDescription::NoRenegotiation).is_fatal());
        assert!(Alert::warning(AlertDescription::BadCertificate).is_fatal());
        assert!(Alert::fatal(AlertDescription::CloseNotify).is_fatal());

        assert!(!Alert::CLOSE_NOTIFY.is_fatal_tls13());
        assert!(!Alert::warning(AlertDescription::UserCanceled).is_fatal_tls13());
        assert!(Alert::warning(AlertDescription::NoRenegotiation).is_fatal_tls13());
    }

    #[test]
    fn test_error_to_alert_mapping() {
        assert_eq!(
            AlertDescription::for_error(&TlsError::DecryptError),
            Some(AlertDescription::DecryptError)
        );
        assert_eq!(
            AlertDescription::for_error(&TlsError::BadCertificate("x".into())),
            Some(AlertDescription::BadCertificate)
        );
        assert_eq!(
            AlertDescription::for_error(&CryptoError::DegenerateSharedSecret.into()),
            Some(AlertDescription::IllegalParameter)
        );
        assert_eq!(AlertDescription::for_error(&TlsError::WouldBlock), None);
        assert_eq!(AlertDescription::for_error(&TlsError::AlertReceived(40)), None);
    }
}
