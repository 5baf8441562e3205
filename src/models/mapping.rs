//! Raw API key → normalized field name tables, and the typed accessors
//! records use to pull validated values out of a mapped row.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use super::normalize::{
    FormatError, collapse_whitespace, parse_amount, parse_decimal, parse_timestamp,
    parse_yes_no_flag, strip_hyphens_or_none, strip_or_none, unescape_html,
};
use super::validation::ValidationError;

/// One row exactly as the portal delivered it.
pub type RawRow = Map<String, Value>;

/// A constant raw-key → normalized-name table for one record kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub record: &'static str,
    pub entries: &'static [(&'static str, &'static str)],
}

impl FieldMap {
    /// Rename the keys this table knows about; everything else is dropped.
    pub fn apply(&self, raw: &RawRow) -> Fields {
        let mut fields = Fields::new(self.record);
        for (raw_key, name) in self.entries {
            if let Some(value) = raw.get(*raw_key) {
                fields.insert(name, value.clone());
            }
        }
        fields
    }

    pub fn raw_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(raw_key, _)| *raw_key)
    }

    pub fn knows(&self, raw_key: &str) -> bool {
        self.entries.iter().any(|(k, _)| *k == raw_key)
    }
}

/// Normalized-name view over a mapped row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    record: &'static str,
    values: Map<String, Value>,
}

impl Fields {
    pub fn new(record: &'static str) -> Self {
        Self {
            record,
            values: Map::new(),
        }
    }

    pub fn record(&self) -> &'static str {
        self.record
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Insert only when `name` has no usable value yet.
    pub fn insert_missing(&mut self, name: &str, value: impl Into<Value>) {
        if self.text(name).is_none() {
            self.insert(name, value);
        }
    }

    /// Overlay `other` on top of `self`; blank values in `other` never win.
    pub fn overlay(&mut self, other: Fields) {
        for (name, value) in other.values {
            if !is_blank(&value) {
                self.values.insert(name, value);
            }
        }
    }

    /// Trimmed textual form of a scalar value; blanks are `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            Value::Null => None,
            Value::String(s) => strip_or_none(s),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    fn missing(&self, field: &'static str) -> ValidationError {
        ValidationError::missing(self.record, field)
    }

    fn invalid(&self, field: &'static str, err: FormatError) -> ValidationError {
        ValidationError::format(self.record, field, err)
    }

    pub fn required_str(&self, field: &'static str) -> Result<String, ValidationError> {
        self.text(field).ok_or_else(|| self.missing(field))
    }

    pub fn opt_str(&self, field: &str) -> Option<String> {
        self.text(field)
    }

    /// Name/title text with HTML character references decoded.
    pub fn required_name(&self, field: &'static str) -> Result<String, ValidationError> {
        self.required_str(field).map(|s| unescape_html(&s).into_owned())
    }

    pub fn opt_name(&self, field: &str) -> Option<String> {
        self.text(field).map(|s| unescape_html(&s).into_owned())
    }

    pub fn opt_doc_no(&self, field: &str) -> Option<String> {
        self.text(field).and_then(|s| collapse_whitespace(&s))
    }

    pub fn opt_biz_reg_no(&self, field: &str) -> Option<String> {
        self.text(field).and_then(|s| strip_hyphens_or_none(&s))
    }

    pub fn opt_timestamp(
        &self,
        field: &'static str,
    ) -> Result<Option<NaiveDateTime>, ValidationError> {
        match self.text(field) {
            Some(s) => parse_timestamp(&s).map_err(|e| self.invalid(field, e)),
            None => Ok(None),
        }
    }

    pub fn required_timestamp(
        &self,
        field: &'static str,
    ) -> Result<NaiveDateTime, ValidationError> {
        self.opt_timestamp(field)?.ok_or_else(|| self.missing(field))
    }

    /// Permissive: anything but `Y`/`N` (or a JSON bool) is `None`.
    pub fn opt_flag(&self, field: &str) -> Option<bool> {
        match self.values.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => parse_yes_no_flag(s),
            _ => None,
        }
    }

    pub fn required_flag(&self, field: &'static str) -> Result<bool, ValidationError> {
        self.opt_flag(field).ok_or_else(|| {
            let value = self.text(field).unwrap_or_default();
            ValidationError::constraint(self.record, field, format!("expected Y/N, got {value:?}"))
        })
    }

    pub fn opt_int(&self, field: &'static str) -> Result<Option<i64>, ValidationError> {
        match self.values.get(field) {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(v) => Ok(Some(v)),
                None => integral_float(n.as_f64())
                    .map(Some)
                    .ok_or_else(|| self.invalid(field, format_error("integer", &n.to_string()))),
            },
            Some(_) => match self.text(field) {
                Some(s) => parse_amount(&s).map_err(|e| self.invalid(field, e)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    pub fn required_int(&self, field: &'static str) -> Result<i64, ValidationError> {
        self.opt_int(field)?.ok_or_else(|| self.missing(field))
    }

    pub fn opt_decimal(&self, field: &'static str) -> Result<Option<f64>, ValidationError> {
        match self.values.get(field) {
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => match self.text(field) {
                Some(s) => parse_decimal(&s).map_err(|e| self.invalid(field, e)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }
}

fn integral_float(value: Option<f64>) -> Option<i64> {
    value.filter(|f| f.fract() == 0.0).map(|f| f as i64)
}

fn format_error(kind: &'static str, value: &str) -> FormatError {
    FormatError {
        kind,
        value: value.to_string(),
    }
}

/// Null, empty or whitespace-only string.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub const LIST_FIELDS: FieldMap = FieldMap {
    record: "list",
    entries: &[
        ("bidPbancNo", "bid_pbanc_no"),
        ("bidPbancOrd", "bid_pbanc_ord"),
        ("bidPbancNm", "bid_pbanc_nm"),
        ("bidPbancNum", "bid_pbanc_num"),
        ("pbancSttsCd", "pbanc_stts_cd"),
        ("pbancSttsCdNm", "pbanc_stts_cd_nm"),
        ("prcmBsneSeCd", "prcm_bsne_se_cd"),
        ("prcmBsneSeCdNm", "prcm_bsne_se_cd_nm"),
        ("bidMthdCd", "bid_mthd_cd"),
        ("bidMthdCdNm", "bid_mthd_cd_nm"),
        ("stdCtrtMthdCd", "std_ctrt_mthd_cd"),
        ("stdCtrtMthdCdNm", "std_ctrt_mthd_cd_nm"),
        ("scsbdMthdCd", "scsbd_mthd_cd"),
        ("scsbdMthdCdNm", "scsbd_mthd_cd_nm"),
        ("pbancPstgDt", "pbanc_pstg_dt"),
        ("pbancKndCd", "pbanc_knd_cd"),
        ("pbancKndCdNm", "pbanc_knd_cd_nm"),
        ("grpNm", "grp_nm"),
        ("slprRcptDdlnDt", "slpr_rcpt_ddln_dt"),
        ("pbancSttsGridCdNm", "pbanc_stts_grid_cd_nm"),
        ("rowNum", "row_num"),
        ("totCnt", "tot_cnt"),
        ("currentPage", "current_page"),
        ("recordCountPerPage", "record_count_per_page"),
        ("nextRowYn", "next_row_yn"),
        ("edocNo", "edoc_no"),
        ("usrDocNoVal", "usr_doc_no_val"),
        ("pbancInstUntyGrpNo", "pbanc_inst_unty_grp_no"),
        ("pbancPstgYn", "pbanc_pstg_yn"),
        ("pbancDscrTrgtYn", "pbanc_dscr_trgt_yn"),
        ("slprRcptBgngYn", "slpr_rcpt_bgng_yn"),
        ("slprRcptDdlnYn", "slpr_rcpt_ddln_yn"),
        ("onbsPrnmntYn", "onbs_prnmnt_yn"),
        ("bidQlfcEndYn", "bid_qlfc_end_yn"),
        ("pbancBfssYn", "pbanc_bfss_yn"),
        ("bidClsfNo", "bid_clsf_no"),
        ("bidPrgrsOrd", "bid_prgrs_ord"),
        ("bidPbancPgstCd", "bid_pbanc_pgst_cd"),
        ("bidPbancPgstCdNm", "bid_pbanc_pgst_cd_nm"),
        ("sfbrSlctnOrd", "sfbr_slctn_ord"),
        ("sfbrSlctnRsltCd", "sfbr_slctn_rslt_cd"),
        ("docSbmsnDdlnDt", "doc_sbmsn_ddln_dt"),
        ("cvlnQlemCrtrNo", "cvln_qlem_crtr_no"),
        ("cvlnQlemPgstCd", "cvln_qlem_pgst_cd"),
        ("objtdmdTermDt", "objtdmd_term_dt"),
        ("bdngAmtYnNm", "bdng_amt_yn_nm"),
        ("slprRcptDdlnDt1", "slpr_rcpt_ddln_dt1"),
    ],
};

pub const DETAIL_FIELDS: FieldMap = FieldMap {
    record: "detail",
    entries: &[
        ("bidPbancNo", "bid_pbanc_no"),
        ("bidPbancOrd", "bid_pbanc_ord"),
        ("bidClsfNo", "bid_clsf_no"),
        ("bidPrgrsOrd", "bid_prgrs_ord"),
        ("bidPbancNm", "bid_pbanc_nm"),
        ("bidPbancNum", "bid_pbanc_num"),
        ("pbancSttsCd", "pbanc_stts_cd"),
        ("pbancSttsCdNm", "pbanc_stts_cd_nm"),
        ("prcmBsneSeCd", "prcm_bsne_se_cd"),
        ("prcmBsneSeCdNm", "prcm_bsne_se_cd_nm"),
        ("bidMthdCd", "bid_mthd_cd"),
        ("bidMthdCdNm", "bid_mthd_cd_nm"),
        ("stdCtrtMthdCd", "std_ctrt_mthd_cd"),
        ("stdCtrtMthdCdNm", "std_ctrt_mthd_cd_nm"),
        ("scsbdMthdCd", "scsbd_mthd_cd"),
        ("scsbdMthdCdNm", "scsbd_mthd_cd_nm"),
        ("pbancInstUntyGrpNo", "pbanc_inst_unty_grp_no"),
        ("pbancInstUntyGrpNoNm", "pbanc_inst_unty_grp_no_nm"),
        ("grpNm", "grp_nm"),
        ("picId", "pic_id"),
        ("picIdNm", "pic_id_nm"),
        ("bidBlffId", "bid_blff_id"),
        ("bidBlffIdNm", "bid_blff_id_nm"),
        ("bsneTlphNo", "bsne_tlph_no"),
        ("bsneFaxNo", "bsne_fax_no"),
        ("bsneEml", "bsne_eml"),
        ("pbancPstgDt", "pbanc_pstg_dt"),
        ("slprRcptBgngDt", "slpr_rcpt_bgng_dt"),
        ("slprRcptDdlnDt", "slpr_rcpt_ddln_dt"),
        ("onbsPrnmntDt", "onbs_prnmnt_dt"),
        ("bidQlfcRegDt", "bid_qlfc_reg_dt"),
        ("onbsPlacNm", "onbs_plac_nm"),
        ("zip", "zip"),
        ("baseAddr", "base_addr"),
        ("dtlAddr", "dtl_addr"),
        ("untyAddr", "unty_addr"),
        ("edocNo", "edoc_no"),
        ("usrDocNoVal", "usr_doc_no_val"),
        ("rbidPrmsYn", "rbid_prms_yn"),
        ("pbancPstgYn", "pbanc_pstg_yn"),
        ("rgnLmtYn", "rgn_lmt_yn"),
        ("lcnsLmtYn", "lcns_lmt_yn"),
        ("pnprUseYn", "pnpr_use_yn"),
        ("pnprRlsYn", "pnpr_rls_yn"),
        ("untyAtchFileNo", "unty_atch_file_no"),
    ],
};

pub const NOTICE_UPDATE_FIELDS: FieldMap = FieldMap {
    record: "notice_update",
    entries: &[
        ("pstNo", "pst_no"),
        ("bbsNo", "bbs_no"),
        ("bidPbancNo", "bid_pbanc_no"),
        ("bidPbancOrd", "bid_pbanc_ord"),
        ("pstTtl", "pst_ttl"),
        ("untyAtchFileNo", "unty_atch_file_no"),
        ("useYn", "use_yn"),
        ("inptDt", "inpt_dt"),
        ("pstCn", "pst_cn"),
    ],
};

pub const ATTACHMENT_FIELDS: FieldMap = FieldMap {
    record: "attachment",
    entries: &[
        ("untyAtchFileNo", "unty_atch_file_no"),
        ("atchFileSqno", "atch_file_sqno"),
        ("bsneClsfCd", "bsne_clsf_cd"),
        ("atchFileKndCd", "atch_file_knd_cd"),
        ("atchFileNm", "atch_file_nm"),
        ("orgnlAtchFileNm", "orgnl_atch_file_nm"),
        ("fileExtnNm", "file_extn_nm"),
        ("fileSz", "file_sz"),
        ("encrBefFileSz", "encr_bef_file_sz"),
        ("imgUrl", "img_url"),
        ("atchFileDscr", "atch_file_dscr"),
        ("mcscChckIdVal", "mcsc_chck_id_val"),
        ("dwnldPrmsYn", "dwnld_prms_yn"),
        ("kbrdrId", "kbrdr_id"),
        ("kbrdrNm", "kbrdr_nm"),
        ("inptDt", "inpt_dt"),
        ("atchFilePathNm", "atch_file_path_nm"),
        ("tblNm", "tbl_nm"),
        ("colNm", "col_nm"),
        ("atchFileRmrkCn", "atch_file_rmrk_cn"),
    ],
};

pub const OPENING_SUMMARY_FIELDS: FieldMap = FieldMap {
    record: "opening_summary",
    entries: &[
        ("bidPbancNo", "bid_pbanc_no"),
        ("bidPbancOrd", "bid_pbanc_ord"),
        ("bidClsfNo", "bid_clsf_no"),
        ("bidPrgrsOrd", "bid_prgrs_ord"),
        ("bidPbancNm", "bid_pbanc_nm"),
        ("bidPbancNum", "bid_pbanc_num"),
        ("pbancSttsCd", "pbanc_stts_cd"),
        ("pbancSttsCdNm", "pbanc_stts_cd_nm"),
        ("prcmBsneSeCd", "prcm_bsne_se_cd"),
        ("prcmBsneSeCdNm", "prcm_bsne_se_cd_nm"),
        ("bidMthdCd", "bid_mthd_cd"),
        ("bidMthdCdNm", "bid_mthd_cd_nm"),
        ("stdCtrtMthdCd", "std_ctrt_mthd_cd"),
        ("stdCtrtMthdCdNm", "std_ctrt_mthd_cd_nm"),
        ("scsbdMthdCd", "scsbd_mthd_cd"),
        ("scsbdMthdCdNm", "scsbd_mthd_cd_nm"),
        ("pbancInstUntyGrpNo", "pbanc_inst_unty_grp_no"),
        ("pbancInstUntyGrpNoNm", "pbanc_inst_unty_grp_no_nm"),
        ("grpNm", "grp_nm"),
        ("bidBlffId", "bid_blff_id"),
        ("bidBlffIdNm", "bid_blff_id_nm"),
        ("ibxOnbsPrnmntDt", "ibx_onbs_prnmnt_dt"),
        ("ibxOnbsDt", "ibx_onbs_dt"),
        ("edocNo", "edoc_no"),
        ("usrDocNoVal", "usr_doc_no_val"),
    ],
};

pub const OPENING_RESULT_FIELDS: FieldMap = FieldMap {
    record: "opening_result",
    entries: &[
        ("bidPbancNo", "bid_pbanc_no"),
        ("bidPbancOrd", "bid_pbanc_ord"),
        ("bidClsfNo", "bid_clsf_no"),
        ("bidPrgrsOrd", "bid_prgrs_ord"),
        ("ibxOnbsRnkg", "ibx_onbs_rnkg"),
        ("ibxGrpNm", "ibx_grp_nm"),
        ("ibxBdngAmt", "ibx_bdng_amt"),
        ("ibxSlprRcptnDt", "ibx_slpr_rcptn_dt"),
        ("ibxBzmnRegNo", "ibx_bzmn_reg_no"),
        ("ibxRprsvNm", "ibx_rprsv_nm"),
        ("bidrPrsnNo", "bidr_prsn_no"),
        ("bidrPrsnNm", "bidr_prsn_nm"),
        ("bidUfnsRsnCd", "bid_ufns_rsn_cd"),
        ("bidUfnsRsnNm", "bid_ufns_rsn_nm"),
        ("ufnsYn", "ufns_yn"),
        ("ibxEvlScrPrpl", "ibx_evl_scr_prpl"),
        ("ibxEvlScrPrce", "ibx_evl_scr_prce"),
        ("ibxEvlScrOvrl", "ibx_evl_scr_ovrl"),
        ("ibxEvlScrPrplNum", "ibx_evl_scr_prpl_num"),
        ("ibxEvlScrPrceNum", "ibx_evl_scr_prce_num"),
        ("ibxEvlScrOvrlNum", "ibx_evl_scr_ovrl_num"),
        ("sfbrSlctnOrd", "sfbr_slctn_ord"),
        ("sfbrSlctnRsltCd", "sfbr_slctn_rslt_cd"),
    ],
};

pub const CODE_DICT_FIELDS: FieldMap = FieldMap {
    record: "code_dict",
    entries: &[
        ("grpCd", "code_group"),
        ("cd", "code"),
        ("cdNm", "code_nm"),
        ("useYn", "use_yn"),
    ],
};
