//! DMI identity of the running machine

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where the kernel exposes DMI strings
pub const DMI_ID_DIR: &str = "/sys/class/dmi/id";

/// The DMI strings board classification keys on
///
/// Missing attributes read as empty strings and never match a table entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmiIdentity {
    pub board_name: String,
    pub product_name: String,
    pub product_sku: String,
}

impl DmiIdentity {
    pub fn new(
        board_name: impl Into<String>,
        product_name: impl Into<String>,
        product_sku: impl Into<String>,
    ) -> Self {
        Self {
            board_name: board_name.into(),
            product_name: product_name.into(),
            product_sku: product_sku.into(),
        }
    }

    /// Read the identity of this machine
    pub fn read() -> Self {
        Self::read_from(Path::new(DMI_ID_DIR))
    }

    /// Read the identity from a directory laid out like `/sys/class/dmi/id`
    pub fn read_from(dir: &Path) -> Self {
        let attr = |name: &str| match fs::read_to_string(dir.join(name)) {
            Ok(value) => value.trim().to_string(),
            Err(e) => {
                debug!("dmi {}: {}", name, e);
                String::new()
            }
        };
        Self {
            board_name: attr("board_name"),
            product_name: attr("product_name"),
            product_sku: attr("product_sku"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.board_name.is_empty() && self.product_name.is_empty() && self.product_sku.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_from_trims_and_tolerates_missing() {
        let dir = std::env::temp_dir().join(format!("uniwill-dmi-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("board_name"), "LAPQC71A\n").unwrap();
        fs::write(dir.join("product_sku"), "  STEPOL1XA04 \n").unwrap();
        let _ = fs::remove_file(dir.join("product_name"));

        let identity = DmiIdentity::read_from(&dir);
        assert_eq!(identity, DmiIdentity::new("LAPQC71A", "", "STEPOL1XA04"));
        assert!(!identity.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let identity = DmiIdentity::read_from(Path::new("/nonexistent/dmi/id"));
        assert!(identity.is_empty());
    }
}
