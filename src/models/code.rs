use serde::Serialize;

use super::mapping::{CODE_DICT_FIELDS, Fields, RawRow};
use super::record::{Collection, Record};
use super::validation::ValidationError;

/// A portal code and its display label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeDictEntry {
    pub code_group: String,
    pub code: String,
    pub code_nm: String,
    pub use_yn: bool,
}

impl CodeDictEntry {
    pub fn from_raw(raw: &RawRow) -> Result<Self, ValidationError> {
        Self::from_fields(&CODE_DICT_FIELDS.apply(raw))
    }

    pub fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            code_group: f.required_str("code_group")?,
            code: f.required_str("code")?,
            code_nm: f.required_name("code_nm")?,
            use_yn: f.required_flag("use_yn")?,
        })
    }
}

impl Record for CodeDictEntry {
    const COLLECTION: Collection = Collection::CodeDict;

    fn unique_key(&self) -> Vec<String> {
        vec![self.code_group.clone(), self.code.clone()]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn use_flag_must_be_recognized() {
        let ok = json!({"grpCd": "PBANC_KND", "cd": "01", "cdNm": "신규", "useYn": "y"});
        let entry = CodeDictEntry::from_raw(ok.as_object().unwrap()).unwrap();
        assert!(entry.use_yn);

        let bad = json!({"grpCd": "PBANC_KND", "cd": "01", "cdNm": "신규", "useYn": "1"});
        let err = CodeDictEntry::from_raw(bad.as_object().unwrap()).unwrap_err();
        assert_eq!(err.field, "use_yn");
    }
}
