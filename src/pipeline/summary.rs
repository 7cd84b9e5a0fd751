//! Per-chapter tally of submitted and in-progress entries, split by category.
//!
//! Rows are ordered by region, then by chapter name ignoring case, which
//! groups chapters of one region together.

use std::collections::{BTreeMap, HashMap};

use crate::models::{CATEGORY_FIELD, Chapter, Snapshot, SummaryConfig};

/// Counts for one chapter and category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    pub submitted: usize,
    pub in_progress: usize,
}

impl StatusTally {
    pub fn total(&self) -> usize {
        self.submitted + self.in_progress
    }

    fn add(&mut self, other: &StatusTally) {
        self.submitted += other.submitted;
        self.in_progress += other.in_progress;
    }
}

/// One active chapter with its per-category counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRow {
    pub region: String,
    pub name: String,
    pub slug: String,
    /// Keyed by category key; every reported category is present
    pub by_category: BTreeMap<String, StatusTally>,
}

impl ChapterRow {
    pub fn total(&self) -> usize {
        self.by_category.values().map(StatusTally::total).sum()
    }
}

/// Chapter rows plus the category columns they are split into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterSummary {
    /// Category keys in column order
    pub categories: Vec<String>,
    pub rows: Vec<ChapterRow>,
}

impl ChapterSummary {
    /// Count current entries per active chapter and category.
    ///
    /// Every active chapter gets a row, even with zero entries. Entries whose
    /// chapter is not active, or whose category is not in `categories`, are
    /// not counted.
    pub fn tally(
        snapshot: &Snapshot,
        chapters: &[Chapter],
        categories: &[String],
        config: &SummaryConfig,
    ) -> Self {
        let empty: BTreeMap<String, StatusTally> = categories
            .iter()
            .map(|c| (c.clone(), StatusTally::default()))
            .collect();

        let mut rows: Vec<ChapterRow> = chapters
            .iter()
            .map(|c| ChapterRow {
                region: c.region.clone(),
                name: c.name.clone(),
                slug: c.slug.clone(),
                by_category: empty.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            (&a.region, a.name.to_lowercase(), &a.slug).cmp(&(
                &b.region,
                b.name.to_lowercase(),
                &b.slug,
            ))
        });

        let row_of: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.slug.clone(), i))
            .collect();

        for record in snapshot.iter() {
            let text = |field: &str| record.field(field).and_then(|v| v.as_text());

            let Some(&index) = text(&config.chapter_field).and_then(|slug| row_of.get(slug))
            else {
                continue;
            };
            let Some(tally) = text(CATEGORY_FIELD)
                .and_then(|category| rows[index].by_category.get_mut(category))
            else {
                continue;
            };

            if text(&config.status_field) == Some(config.submitted_status.as_str()) {
                tally.submitted += 1;
            } else {
                tally.in_progress += 1;
            }
        }

        Self {
            categories: categories.to_vec(),
            rows,
        }
    }

    /// Column totals over every row.
    pub fn totals(&self) -> BTreeMap<String, StatusTally> {
        let mut totals: BTreeMap<String, StatusTally> = self
            .categories
            .iter()
            .map(|c| (c.clone(), StatusTally::default()))
            .collect();
        for row in &self.rows {
            for (category, tally) in &row.by_category {
                totals.entry(category.clone()).or_default().add(tally);
            }
        }
        totals
    }

    pub fn total(&self) -> usize {
        self.rows.iter().map(ChapterRow::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn chapter(slug: &str, name: &str, region: &str) -> Chapter {
        Chapter {
            slug: slug.into(),
            name: name.into(),
            region: region.into(),
        }
    }

    fn entry(id: &str, chapter: &str, category: &str, status: &str) -> Record {
        Record::new(id)
            .with_field("chapter", chapter)
            .with_field(CATEGORY_FIELD, category)
            .with_field("status", status)
    }

    fn categories() -> Vec<String> {
        vec!["13_17".into(), "above18".into()]
    }

    #[test]
    fn test_rows_split_by_category() {
        let chapters = vec![
            chapter("mx", "Mexico", "AMR"),
            chapter("jp", "Japan", "APJ"),
            chapter("br", "brazil", "AMR"),
            chapter("de", "Germany", "EMEA"),
        ];
        let snapshot = Snapshot::from_records(vec![
            entry("1", "br", "13_17", "submitted"),
            entry("2", "br", "above18", "in_progress"),
            entry("3", "br", "above18", "submitted"),
            entry("4", "jp", "13_17", "draft"),
            entry("5", "xx", "13_17", "submitted"),
            entry("6", "mx", "other", "submitted"),
            Record::new("7"),
        ]);

        let summary = ChapterSummary::tally(&snapshot, &chapters, &categories(), &SummaryConfig::default());

        let order: Vec<_> = summary
            .rows
            .iter()
            .map(|r| (r.region.as_str(), r.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("AMR", "brazil"),
                ("AMR", "Mexico"),
                ("APJ", "Japan"),
                ("EMEA", "Germany"),
            ]
        );

        let brazil = &summary.rows[0];
        assert_eq!(
            brazil.by_category["13_17"],
            StatusTally {
                submitted: 1,
                in_progress: 0
            }
        );
        assert_eq!(
            brazil.by_category["above18"],
            StatusTally {
                submitted: 1,
                in_progress: 1
            }
        );
        assert_eq!(brazil.total(), 3);

        assert_eq!(summary.rows[1].total(), 0);
        assert_eq!(summary.rows[2].by_category["13_17"].in_progress, 1);
        assert_eq!(summary.rows[3].by_category.len(), 2);

        assert_eq!(summary.total(), 4);
        let totals = summary.totals();
        assert_eq!(totals["13_17"].total(), 2);
        assert_eq!(totals["above18"].total(), 2);
    }

    #[test]
    fn test_no_active_chapters() {
        let snapshot = Snapshot::from_records(vec![entry("1", "br", "13_17", "submitted")]);
        let summary = ChapterSummary::tally(&snapshot, &[], &categories(), &SummaryConfig::default());
        assert!(summary.is_empty());
        assert_eq!(summary.totals()["13_17"], StatusTally::default());
    }
}
