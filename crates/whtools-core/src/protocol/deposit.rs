//! Outbound `DEPOSIT:` frames.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// How the deposited payload is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositEncoding {
    /// Each line of the file is already a hex message.
    Hex,
    /// Each line of the file is already a base64 message.
    Base64,
    /// The whole file is one binary message, sent hex encoded.
    Ber,
}

impl DepositEncoding {
    /// Wire name of the encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositEncoding::Hex => "hex",
            DepositEncoding::Base64 => "base64",
            DepositEncoding::Ber => "ber",
        }
    }
}

impl fmt::Display for DepositEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(DepositEncoding::Hex),
            "base64" => Ok(DepositEncoding::Base64),
            "ber" => Ok(DepositEncoding::Ber),
            _ => Err(InvalidInputError::DepositEncoding {
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// One `DEPOSIT:` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositMessage<'a> {
    pub system_deposit_name: &'a str,
    pub encode_type: DepositEncoding,
    pub encoded_msg: &'a str,
}

impl fmt::Display for DepositMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DEPOSIT: {{ \"systemDepositName\": \"{}\", \"encodeType\": \"{}\", \"encodedMsg\": \"{}\" }}",
            self.system_deposit_name, self.encode_type, self.encoded_msg
        )
    }
}

/// Build the deposit frames for one file.
///
/// `hex` and `base64` files hold one encoded message per line; blank lines
/// are skipped. A `ber` file is a single binary message.
pub fn deposit_messages(
    system_deposit_name: &str,
    encoding: DepositEncoding,
    contents: &[u8],
) -> Vec<String> {
    match encoding {
        DepositEncoding::Hex | DepositEncoding::Base64 => String::from_utf8_lossy(contents)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                DepositMessage {
                    system_deposit_name,
                    encode_type: encoding,
                    encoded_msg: line,
                }
                .to_string()
            })
            .collect(),
        DepositEncoding::Ber => {
            let encoded = hex::encode(contents);
            vec![
                DepositMessage {
                    system_deposit_name,
                    encode_type: encoding,
                    encoded_msg: &encoded,
                }
                .to_string(),
            ]
        }
    }
}
