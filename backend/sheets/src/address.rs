use std::fmt::{self, Display};

/// 1-based grid coordinate, the addressing scheme of the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Renders as A1 notation, e.g. `(10, 27)` -> `AA10`.
    pub fn to_a1(self) -> String {
        format!("{}{}", column_letters(self.col), self.row)
    }
}

impl Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Bijective base-26 column name. Column 0 has no name and renders empty.
pub fn column_letters(col: usize) -> String {
    let mut n = col;
    let mut letters = Vec::new();

    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }

    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quotes a worksheet title for use inside a range, doubling embedded quotes.
pub fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::{CellAddress, column_letters, quote_sheet};

    #[test]
    fn test_single_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(4), "D");
        assert_eq!(column_letters(26), "Z");
    }

    #[test]
    fn test_multi_letters() {
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(53), "BA");
        assert_eq!(column_letters(702), "ZZ");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn test_a1() {
        assert_eq!(CellAddress::new(1, 1).to_a1(), "A1");
        assert_eq!(CellAddress::new(10, 27).to_string(), "AA10");
    }

    #[test]
    fn test_quote_sheet() {
        assert_eq!(quote_sheet("ATTENDANCE 2026"), "'ATTENDANCE 2026'");
        assert_eq!(quote_sheet("Bob's"), "'Bob''s'");
    }
}
