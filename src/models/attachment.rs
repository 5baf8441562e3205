use chrono::NaiveDateTime;
use serde::Serialize;

use super::mapping::{ATTACHMENT_FIELDS, Fields, RawRow};
use super::record::{Collection, Record, timestamp};
use super::validation::ValidationError;

/// One file of an attachment group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentItem {
    pub unty_atch_file_no: String,
    pub atch_file_sqno: i64,
    pub bsne_clsf_cd: String,
    pub atch_file_knd_cd: Option<String>,
    pub atch_file_nm: String,
    pub orgnl_atch_file_nm: String,
    pub file_extn_nm: String,
    pub file_sz: i64,
    pub encr_bef_file_sz: Option<i64>,
    pub img_url: Option<String>,
    pub atch_file_dscr: Option<String>,
    pub mcsc_chck_id_val: Option<String>,
    pub dwnld_prms_yn: Option<bool>,
    pub kbrdr_id: Option<String>,
    pub kbrdr_nm: Option<String>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub inpt_dt: Option<NaiveDateTime>,
    pub atch_file_path_nm: Option<String>,
    pub tbl_nm: Option<String>,
    pub col_nm: Option<String>,
    pub atch_file_rmrk_cn: Option<String>,
}

impl AttachmentItem {
    /// Rows of the attachment API usually carry their group id, but the
    /// requested one is used when they do not.
    pub fn build(group_no: &str, raw: &RawRow) -> Result<Self, ValidationError> {
        let mut fields = ATTACHMENT_FIELDS.apply(raw);
        fields.insert_missing("unty_atch_file_no", group_no);
        Self::from_fields(&fields)
    }

    pub fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            unty_atch_file_no: f.required_str("unty_atch_file_no")?,
            atch_file_sqno: f.required_int("atch_file_sqno")?,
            bsne_clsf_cd: f.required_str("bsne_clsf_cd")?,
            atch_file_knd_cd: f.opt_str("atch_file_knd_cd"),
            atch_file_nm: f.required_name("atch_file_nm")?,
            orgnl_atch_file_nm: f.required_name("orgnl_atch_file_nm")?,
            file_extn_nm: f.required_str("file_extn_nm")?,
            file_sz: f.required_int("file_sz")?,
            encr_bef_file_sz: f.opt_int("encr_bef_file_sz")?,
            img_url: f.opt_str("img_url"),
            atch_file_dscr: f.opt_name("atch_file_dscr"),
            mcsc_chck_id_val: f.opt_str("mcsc_chck_id_val"),
            dwnld_prms_yn: f.opt_flag("dwnld_prms_yn"),
            kbrdr_id: f.opt_str("kbrdr_id"),
            kbrdr_nm: f.opt_name("kbrdr_nm"),
            inpt_dt: f.opt_timestamp("inpt_dt")?,
            atch_file_path_nm: f.opt_str("atch_file_path_nm"),
            tbl_nm: f.opt_str("tbl_nm"),
            col_nm: f.opt_str("col_nm"),
            atch_file_rmrk_cn: f.opt_name("atch_file_rmrk_cn"),
        })
    }
}

impl Record for AttachmentItem {
    const COLLECTION: Collection = Collection::Attachment;

    fn unique_key(&self) -> Vec<String> {
        vec![self.unty_atch_file_no.clone(), self.atch_file_sqno.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row() -> RawRow {
        json!({
            "atchFileSqno": 1,
            "bsneClsfCd": "BID",
            "atchFileNm": "a1b2c3.hwp",
            "orgnlAtchFileNm": "과업지시서&#40;최종&#41;.hwp",
            "fileExtnNm": "hwp",
            "fileSz": "1,024",
            "encrBefFileSz": 998,
            "dwnldPrmsYn": "Y",
            "inptDt": "2026/02/06 19:11:42"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn builds_with_requested_group_id() {
        let item = AttachmentItem::build("ATCH-1", &row()).unwrap();
        assert_eq!(item.unty_atch_file_no, "ATCH-1");
        assert_eq!(item.file_sz, 1024);
        assert_eq!(item.encr_bef_file_sz, Some(998));
        assert_eq!(item.orgnl_atch_file_nm, "과업지시서(최종).hwp");
        assert_eq!(item.dwnld_prms_yn, Some(true));
        assert_eq!(item.unique_key(), vec!["ATCH-1", "1"]);
    }

    #[test]
    fn row_group_id_wins() {
        let mut raw = row();
        raw.insert("untyAtchFileNo".into(), json!("ATCH-9"));
        let item = AttachmentItem::build("ATCH-1", &raw).unwrap();
        assert_eq!(item.unty_atch_file_no, "ATCH-9");
    }

    #[test]
    fn file_size_is_required() {
        let mut raw = row();
        raw.remove("fileSz");
        let err = AttachmentItem::build("ATCH-1", &raw).unwrap_err();
        assert_eq!(err.field, "file_sz");
    }
}
