// src/services/roster.rs
//! Static reference roster for NIM lookups.
//!
//! The NIM-based lookup resolves against this roster, an external data
//! source unrelated to ledger state. Until its intended upstream is
//! clarified it ships as a built-in table; it is deliberately NOT backed
//! by ledger queries.

use once_cell::sync::Lazy;
use serde::Serialize;

/// One student entry in the reference roster.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub nim: &'static str,
    pub holder_name: &'static str,
    pub study_program: &'static str,
    pub graduation_year: &'static str,
}

static REFERENCE_ROSTER: Lazy<Vec<RosterEntry>> = Lazy::new(|| {
    vec![
        RosterEntry {
            nim: "13518001",
            holder_name: "Aditya Pratama",
            study_program: "Teknik Informatika",
            graduation_year: "2022",
        },
        RosterEntry {
            nim: "13518044",
            holder_name: "Siti Rahmawati",
            study_program: "Sistem Informasi",
            graduation_year: "2022",
        },
        RosterEntry {
            nim: "13519102",
            holder_name: "Budi Santoso",
            study_program: "Teknik Informatika",
            graduation_year: "2023",
        },
        RosterEntry {
            nim: "13519155",
            holder_name: "Dewi Lestari",
            study_program: "Teknik Elektro",
            graduation_year: "2023",
        },
    ]
});

/// Pure roster lookup by student number.
pub fn find_by_nim(nim: &str) -> Option<&'static RosterEntry> {
    REFERENCE_ROSTER.iter().find(|entry| entry.nim == nim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_nim_resolves() {
        let entry = find_by_nim("13518001").unwrap();
        assert_eq!(entry.holder_name, "Aditya Pratama");
    }

    #[test]
    fn unknown_nim_is_none() {
        assert!(find_by_nim("99999999").is_none());
    }
}
