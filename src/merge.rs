//! Attaches collapsed NER labels to posts as per-label mention counts.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::labels::LabelDictionary;
use crate::model::{Post, normalize_id};

/// Entities recognized in one post. Only place names are used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NerRecord {
    #[serde(rename = "GPE_COUNTRY", default)]
    pub gpe_country: Option<Vec<String>>,
}

/// NER results keyed by normalized post id.
#[derive(Debug, Clone, Default)]
pub struct NerOutput {
    by_id: HashMap<String, Vec<String>>,
}

impl NerOutput {
    pub fn from_records(records: HashMap<String, NerRecord>) -> Self {
        let by_id = records
            .into_iter()
            .map(|(id, rec)| (normalize_id(&id), rec.gpe_country.unwrap_or_default()))
            .collect();
        Self { by_id }
    }

    pub fn mentions(&self, raw_id: &str) -> &[String] {
        self.by_id
            .get(&normalize_id(raw_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub posts: usize,
    pub posts_with_labels: usize,
    pub resolved_mentions: usize,
    pub unresolved_mentions: usize,
}

/// Counts, for every post, how many of its mentions resolve to each label.
///
/// Every label of `dictionary` gets an entry, zero when unmentioned, and the
/// posts come back ordered by timestamp.
pub fn merge_labels(
    posts: Vec<Post>,
    ner: &NerOutput,
    dictionary: &LabelDictionary,
) -> (Vec<Post>, MergeSummary) {
    let labels = dictionary.labels();
    let mut summary = MergeSummary {
        posts: posts.len(),
        ..MergeSummary::default()
    };

    let mut merged: Vec<Post> = posts
        .into_iter()
        .map(|mut post| {
            let mut flags: BTreeMap<String, u32> =
                labels.iter().map(|l| (l.clone(), 0)).collect();
            for mention in ner.mentions(&post.publisher_id) {
                match dictionary.resolve(mention) {
                    Some(label) => {
                        summary.resolved_mentions += 1;
                        if let Some(count) = flags.get_mut(label) {
                            *count += 1;
                        }
                    }
                    None => summary.unresolved_mentions += 1,
                }
            }
            if flags.values().any(|&c| c > 0) {
                summary.posts_with_labels += 1;
            }
            post.group_flags = flags;
            post
        })
        .collect();

    merged.sort_by_key(|p| p.timestamp);
    (merged, summary)
}
