//! What every persisted record has in common: a collection, a unique key and
//! a stable CSV column order (the struct field order).

use serde::Serialize;

/// The append-only stores kept by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    List,
    Detail,
    NoticeUpdate,
    Attachment,
    OpeningSummary,
    OpeningResult,
    CodeDict,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::List,
        Collection::Detail,
        Collection::NoticeUpdate,
        Collection::Attachment,
        Collection::OpeningSummary,
        Collection::OpeningResult,
        Collection::CodeDict,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Collection::List => "list",
            Collection::Detail => "detail",
            Collection::NoticeUpdate => "notice_update",
            Collection::Attachment => "attachment",
            Collection::OpeningSummary => "opening_summary",
            Collection::OpeningResult => "opening_result",
            Collection::CodeDict => "code_dict",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Collection::List => "bid_notice_list.csv",
            Collection::Detail => "bid_notice_detail.csv",
            Collection::NoticeUpdate => "bid_notice_noce.csv",
            Collection::Attachment => "bid_notice_attachment.csv",
            Collection::OpeningSummary => "bid_opening_summary.csv",
            Collection::OpeningResult => "bid_opening_result.csv",
            Collection::CodeDict => "comm_cd.csv",
        }
    }

    /// Column names forming the dedupe key, in key order.
    pub fn key_columns(self) -> &'static [&'static str] {
        const NOTICE_PHASE: &[&str] =
            &["bid_pbanc_no", "bid_pbanc_ord", "bid_clsf_no", "bid_prgrs_ord"];
        match self {
            Collection::List => &["bid_pbanc_no", "bid_pbanc_ord"],
            Collection::Detail | Collection::OpeningSummary => NOTICE_PHASE,
            Collection::NoticeUpdate => &["pst_no", "bbs_no"],
            Collection::Attachment => &["unty_atch_file_no", "atch_file_sqno"],
            Collection::OpeningResult => &[
                "bid_pbanc_no",
                "bid_pbanc_ord",
                "bid_clsf_no",
                "bid_prgrs_ord",
                "ibx_onbs_rnkg",
            ],
            Collection::CodeDict => &["code_group", "code"],
        }
    }
}

/// A validated record the repository can dedupe and append.
pub trait Record: Serialize {
    const COLLECTION: Collection;

    /// Key values in [`Collection::key_columns`] order, rendered exactly as
    /// they appear in the CSV cell (absent values are empty strings).
    fn unique_key(&self) -> Vec<String>;
}

/// Identifies a notice, and optionally one phase of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoticeKey {
    pub bid_pbanc_no: String,
    pub bid_pbanc_ord: String,
    pub bid_clsf_no: Option<String>,
    pub bid_prgrs_ord: Option<String>,
}

impl NoticeKey {
    /// `R26BK01292424-001`, used in log lines and snapshot names.
    pub fn notice_id(&self) -> String {
        format!("{}-{}", self.bid_pbanc_no, self.bid_pbanc_ord)
    }

    /// Classification and progress, when both are known.
    pub fn phase(&self) -> Option<(&str, &str)> {
        match (&self.bid_clsf_no, &self.bid_prgrs_ord) {
            (Some(clsf), Some(prgrs)) => Some((clsf.as_str(), prgrs.as_str())),
            _ => None,
        }
    }

    pub(crate) fn phase_key(&self) -> Vec<String> {
        vec![
            self.bid_pbanc_no.clone(),
            self.bid_pbanc_ord.clone(),
            self.bid_clsf_no.clone().unwrap_or_default(),
            self.bid_prgrs_ord.clone().unwrap_or_default(),
        ]
    }
}

/// CSV rendering of `NaiveDateTime` fields.
pub(crate) mod timestamp {
    use chrono::NaiveDateTime;
    use serde::Serializer;

    use crate::models::normalize::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn serialize_opt<S: Serializer>(
        value: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serialize(v, s),
            None => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_distinct() {
        let mut names: Vec<_> = Collection::ALL.iter().map(|c| c.file_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Collection::ALL.len());
    }

    #[test]
    fn phase_requires_both_parts() {
        let mut key = NoticeKey {
            bid_pbanc_no: "R26BK01292424".into(),
            bid_pbanc_ord: "001".into(),
            bid_clsf_no: Some("0".into()),
            bid_prgrs_ord: None,
        };
        assert_eq!(key.phase(), None);
        key.bid_prgrs_ord = Some("000".into());
        assert_eq!(key.phase(), Some(("0", "000")));
        assert_eq!(key.notice_id(), "R26BK01292424-001");
    }
}
