//! Sequential storage names for stored PDFs: zero-padded decimal numbers
//! with a `.pdf` suffix (`001.pdf`, `002.pdf`, ...).

use chrono::Utc;
use tokio::sync::Mutex;

pub fn parse_storage_number(name: &str) -> Option<u64> {
    name.strip_suffix(".pdf")?.parse().ok()
}

pub fn format_storage_name(number: u64) -> String {
    format!("{:03}.pdf", number)
}

/// Last-resort name used when the stored files cannot be enumerated at all.
pub fn fallback_storage_name() -> String {
    format!("{}.pdf", Utc::now().timestamp())
}

pub fn highest_number<'a>(names: impl IntoIterator<Item = &'a str>) -> u64 {
    names
        .into_iter()
        .filter_map(parse_storage_number)
        .max()
        .unwrap_or(0)
}

pub fn is_valid_storage_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Hands out storage names in strictly increasing order. The high-water mark
/// seeds from the highest name on disk and only moves forward, so deleting
/// `003.pdf` never causes a later upload to receive `003.pdf` again. A mark
/// at `u64::MAX` stops the numeric sequence; clock names take over.
#[derive(Debug)]
pub struct NameAllocator {
    high_water: Mutex<Option<u64>>,
}

impl NameAllocator {
    pub fn seeded(highest: u64) -> Self {
        Self {
            high_water: Mutex::new(Some(highest)),
        }
    }

    /// Starting point not yet known; `allocate` returns `None` until
    /// `seed_and_allocate` establishes the mark.
    pub fn unseeded() -> Self {
        Self {
            high_water: Mutex::new(None),
        }
    }

    pub async fn allocate(&self) -> Option<String> {
        let mut guard = self.high_water.lock().await;
        match (*guard)?.checked_add(1) {
            Some(next) => {
                *guard = Some(next);
                Some(format_storage_name(next))
            }
            None => Some(fallback_storage_name()),
        }
    }

    /// Seed the mark from a fresh directory scan, unless a concurrent caller
    /// already seeded it, then allocate.
    pub async fn seed_and_allocate(&self, highest_on_disk: u64) -> String {
        let mut guard = self.high_water.lock().await;
        let mark = (*guard).unwrap_or(highest_on_disk);
        match mark.checked_add(1) {
            Some(next) => {
                *guard = Some(next);
                format_storage_name(next)
            }
            None => {
                *guard = Some(mark);
                fallback_storage_name()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_and_wide_names() {
        assert_eq!(parse_storage_number("001.pdf"), Some(1));
        assert_eq!(parse_storage_number("042.pdf"), Some(42));
        assert_eq!(parse_storage_number("1000.pdf"), Some(1000));
    }

    #[test]
    fn rejects_non_sequence_names() {
        assert_eq!(parse_storage_number("report.pdf"), None);
        assert_eq!(parse_storage_number("001.txt"), None);
        assert_eq!(parse_storage_number("001"), None);
        assert_eq!(parse_storage_number(""), None);
    }

    #[test]
    fn formats_with_padding() {
        assert_eq!(format_storage_name(1), "001.pdf");
        assert_eq!(format_storage_name(999), "999.pdf");
        assert_eq!(format_storage_name(1000), "1000.pdf");
    }

    #[test]
    fn highest_number_ignores_strays() {
        let names = ["001.pdf", "notes.txt", "007.pdf", "abc.pdf"];
        assert_eq!(highest_number(names), 7);
        assert_eq!(highest_number([]), 0);
    }

    #[test]
    fn fallback_is_numeric_pdf() {
        let name = fallback_storage_name();
        assert!(parse_storage_number(&name).is_some());
    }

    #[test]
    fn validates_plain_file_names() {
        assert!(is_valid_storage_name("001.pdf"));
        assert!(is_valid_storage_name("1000.pdf"));
        assert!(!is_valid_storage_name(""));
        assert!(!is_valid_storage_name("."));
        assert!(!is_valid_storage_name(".."));
        assert!(!is_valid_storage_name("../002.pdf"));
        assert!(!is_valid_storage_name("a/b.pdf"));
        assert!(!is_valid_storage_name("a\\b.pdf"));
    }

    #[tokio::test]
    async fn allocates_in_increasing_order() {
        let allocator = NameAllocator::seeded(41);
        assert_eq!(allocator.allocate().await.as_deref(), Some("042.pdf"));
        assert_eq!(allocator.allocate().await.as_deref(), Some("043.pdf"));
    }

    #[tokio::test]
    async fn never_reissues_after_the_mark_moves() {
        let allocator = NameAllocator::seeded(3);
        let first = allocator.allocate().await;
        // A later scan reporting fewer files must not move the mark back.
        let second = allocator.seed_and_allocate(1).await;
        assert_eq!(first.as_deref(), Some("004.pdf"));
        assert_eq!(second, "005.pdf");
    }

    #[tokio::test]
    async fn unseeded_defers_until_scanned() {
        let allocator = NameAllocator::unseeded();
        assert_eq!(allocator.allocate().await, None);
        assert_eq!(allocator.seed_and_allocate(7).await, "008.pdf");
        assert_eq!(allocator.allocate().await.as_deref(), Some("009.pdf"));
    }

    #[tokio::test]
    async fn saturated_mark_hands_out_clock_names() {
        let allocator = NameAllocator::seeded(u64::MAX);
        let name = allocator.allocate().await.unwrap();
        assert!(parse_storage_number(&name).is_some());
        assert_ne!(name, "000.pdf");
    }

    #[tokio::test]
    async fn seeding_at_the_ceiling_does_not_wrap() {
        let allocator = NameAllocator::unseeded();
        let first = allocator.seed_and_allocate(u64::MAX).await;
        assert!(parse_storage_number(&first).is_some());
        assert_ne!(first, "000.pdf");
        // The mark stays pinned at the ceiling instead of resetting.
        assert!(allocator.allocate().await.is_some());
    }
}
