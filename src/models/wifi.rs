use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::ValidationError;

/// EUI-48 硬件地址
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = ValidationError;

    /// 支持 `:` / `-` 分隔或 12 位连续十六进制
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMac {
            value: s.to_string(),
        };
        let trimmed = s.trim();
        let hex: String = if trimmed.contains(':') || trimmed.contains('-') {
            let parts: Vec<&str> = trimmed.split(|c| c == ':' || c == '-').collect();
            if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
                return Err(invalid());
            }
            parts.concat()
        } else {
            trimmed.to_string()
        };
        if hex.len() != 12 || !hex.is_ascii() {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// wifi MAC 注册信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WifiMacInfo {
    pub registered: Vec<MacAddress>,
    /// 页面提供的槽位总数
    pub slots: usize,
    #[serde(skip)]
    pub verification_token: String,
}

impl WifiMacInfo {
    pub fn is_registered(&self, mac: &MacAddress) -> bool {
        self.registered.contains(mac)
    }

    pub fn has_free_slot(&self) -> bool {
        self.registered.len() < self.slots
    }
}
