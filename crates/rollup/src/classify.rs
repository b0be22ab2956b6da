use serde::Serialize;

/// One row of the NLSR table: a group label and the substring that selects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NlsrEntry {
    pub name: String,
    pub keyword: String,
    keyword_lower: String,
}

impl NlsrEntry {
    pub fn new(name: impl Into<String>, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        Self {
            name: name.into(),
            keyword_lower: keyword.to_lowercase(),
            keyword,
        }
    }
}

/// Result of classifying one description. Both fields are empty when no
/// keyword matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub group: String,
    pub keyword: String,
}

/// Ordered keyword table. Order is significant: the first matching entry wins,
/// not the longest or most specific one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationTable {
    entries: Vec<NlsrEntry>,
}

impl ClassificationTable {
    /// Entries with an empty name or keyword are dropped; an empty keyword
    /// would otherwise match every description.
    pub fn new(entries: impl IntoIterator<Item = NlsrEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|e| !e.name.trim().is_empty() && !e.keyword.trim().is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[NlsrEntry] {
        &self.entries
    }

    /// Case-insensitive substring match, first entry in table order wins.
    pub fn classify(&self, description: &str) -> Classification {
        let haystack = description.to_lowercase();
        self.entries
            .iter()
            .find(|entry| haystack.contains(&entry.keyword_lower))
            .map(|entry| Classification {
                group: entry.name.clone(),
                keyword: entry.keyword.clone(),
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassificationTable {
        ClassificationTable::new([
            NlsrEntry::new("Кровля", "кровл"),
            NlsrEntry::new("Фасад", "фасад"),
            NlsrEntry::new("Кровля и фасад", "кровля и фасад"),
        ])
    }

    #[test]
    fn case_insensitive_match() {
        let c = table().classify("РЕМОНТ КРОВЛИ здания");
        assert_eq!(c.group, "Кровля");
        assert_eq!(c.keyword, "кровл");
    }

    #[test]
    fn first_match_wins_over_more_specific() {
        // Matches both "кровл" (first) and "кровля и фасад" (third)
        let c = table().classify("Кровля и фасад, корпус 2");
        assert_eq!(c.group, "Кровля");
    }

    #[test]
    fn order_decides_between_two_matches() {
        let reversed = ClassificationTable::new([
            NlsrEntry::new("Фасад", "фасад"),
            NlsrEntry::new("Кровля", "кровл"),
        ]);
        let c = reversed.classify("кровля и фасад");
        assert_eq!(c.group, "Фасад");
    }

    #[test]
    fn no_match_is_empty() {
        let c = table().classify("Электроснабжение");
        assert_eq!(c, Classification::default());
        assert!(c.group.is_empty() && c.keyword.is_empty());
    }

    #[test]
    fn empty_table_never_matches() {
        let c = ClassificationTable::default().classify("Кровля");
        assert_eq!(c, Classification::default());
    }

    #[test]
    fn blank_keywords_are_dropped() {
        let t = ClassificationTable::new([
            NlsrEntry::new("Всё", "  "),
            NlsrEntry::new("", "кровл"),
            NlsrEntry::new("Кровля", "кровл"),
        ]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.classify("Сети").group, "");
    }
}
