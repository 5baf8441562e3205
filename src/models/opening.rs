//! Bid opening summary (`pbancMap`) and per-bidder results (`oobsRsltList`).

use chrono::NaiveDateTime;
use serde::Serialize;

use super::mapping::{Fields, OPENING_RESULT_FIELDS, OPENING_SUMMARY_FIELDS, RawRow};
use super::normalize::parse_decimal;
use super::notice::DetailItem;
use super::record::{Collection, NoticeKey, Record, timestamp};
use super::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpeningSummary {
    pub bid_pbanc_no: String,
    pub bid_pbanc_ord: String,
    pub bid_clsf_no: Option<String>,
    pub bid_prgrs_ord: Option<String>,
    pub bid_pbanc_nm: String,
    pub bid_pbanc_num: String,
    pub pbanc_stts_cd: String,
    pub pbanc_stts_cd_nm: String,
    pub prcm_bsne_se_cd: Option<String>,
    pub prcm_bsne_se_cd_nm: Option<String>,
    pub bid_mthd_cd: Option<String>,
    pub bid_mthd_cd_nm: Option<String>,
    pub std_ctrt_mthd_cd: Option<String>,
    pub std_ctrt_mthd_cd_nm: Option<String>,
    pub scsbd_mthd_cd: Option<String>,
    pub scsbd_mthd_cd_nm: Option<String>,
    pub pbanc_inst_unty_grp_no: Option<String>,
    pub pbanc_inst_unty_grp_no_nm: Option<String>,
    pub grp_nm: Option<String>,
    pub bid_blff_id: Option<String>,
    pub bid_blff_id_nm: Option<String>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub ibx_onbs_prnmnt_dt: Option<NaiveDateTime>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub ibx_onbs_dt: Option<NaiveDateTime>,
    pub edoc_no: Option<String>,
    pub usr_doc_no_val: Option<String>,
}

impl OpeningSummary {
    /// Summary map over the detail record's identity fields.
    pub fn build(detail: &DetailItem, raw: &RawRow) -> Result<Self, ValidationError> {
        let mut fields = detail.opening_fallback();
        fields.overlay(OPENING_SUMMARY_FIELDS.apply(raw));
        Self::from_fields(&fields)
    }

    pub fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            bid_pbanc_no: f.required_str("bid_pbanc_no")?,
            bid_pbanc_ord: f.required_str("bid_pbanc_ord")?,
            bid_clsf_no: f.opt_str("bid_clsf_no"),
            bid_prgrs_ord: f.opt_str("bid_prgrs_ord"),
            bid_pbanc_nm: f.required_name("bid_pbanc_nm")?,
            bid_pbanc_num: f.required_str("bid_pbanc_num")?,
            pbanc_stts_cd: f.required_str("pbanc_stts_cd")?,
            pbanc_stts_cd_nm: f.required_str("pbanc_stts_cd_nm")?,
            prcm_bsne_se_cd: f.opt_str("prcm_bsne_se_cd"),
            prcm_bsne_se_cd_nm: f.opt_str("prcm_bsne_se_cd_nm"),
            bid_mthd_cd: f.opt_str("bid_mthd_cd"),
            bid_mthd_cd_nm: f.opt_str("bid_mthd_cd_nm"),
            std_ctrt_mthd_cd: f.opt_str("std_ctrt_mthd_cd"),
            std_ctrt_mthd_cd_nm: f.opt_str("std_ctrt_mthd_cd_nm"),
            scsbd_mthd_cd: f.opt_str("scsbd_mthd_cd"),
            scsbd_mthd_cd_nm: f.opt_str("scsbd_mthd_cd_nm"),
            pbanc_inst_unty_grp_no: f.opt_str("pbanc_inst_unty_grp_no"),
            pbanc_inst_unty_grp_no_nm: f.opt_name("pbanc_inst_unty_grp_no_nm"),
            grp_nm: f.opt_name("grp_nm"),
            bid_blff_id: f.opt_str("bid_blff_id"),
            bid_blff_id_nm: f.opt_name("bid_blff_id_nm"),
            ibx_onbs_prnmnt_dt: f.opt_timestamp("ibx_onbs_prnmnt_dt")?,
            ibx_onbs_dt: f.opt_timestamp("ibx_onbs_dt")?,
            edoc_no: f.opt_doc_no("edoc_no"),
            usr_doc_no_val: f.opt_doc_no("usr_doc_no_val"),
        })
    }
}

impl Record for OpeningSummary {
    const COLLECTION: Collection = Collection::OpeningSummary;

    fn unique_key(&self) -> Vec<String> {
        NoticeKey {
            bid_pbanc_no: self.bid_pbanc_no.clone(),
            bid_pbanc_ord: self.bid_pbanc_ord.clone(),
            bid_clsf_no: self.bid_clsf_no.clone(),
            bid_prgrs_ord: self.bid_prgrs_ord.clone(),
        }
        .phase_key()
    }
}

/// One bidder's line in the opening result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpeningResult {
    pub bid_pbanc_no: String,
    pub bid_pbanc_ord: String,
    pub bid_clsf_no: Option<String>,
    pub bid_prgrs_ord: Option<String>,
    pub ibx_onbs_rnkg: i64,
    pub ibx_grp_nm: String,
    pub ibx_bdng_amt: i64,
    #[serde(serialize_with = "timestamp::serialize")]
    pub ibx_slpr_rcptn_dt: NaiveDateTime,
    pub ibx_bzmn_reg_no: Option<String>,
    pub ibx_rprsv_nm: Option<String>,
    pub bidr_prsn_no: Option<String>,
    pub bidr_prsn_nm: Option<String>,
    pub bid_ufns_rsn_cd: Option<String>,
    pub bid_ufns_rsn_nm: Option<String>,
    pub ufns_yn: Option<bool>,
    pub ibx_evl_scr_prpl: Option<String>,
    pub ibx_evl_scr_prce: Option<String>,
    pub ibx_evl_scr_ovrl: Option<String>,
    pub ibx_evl_scr_prpl_num: Option<f64>,
    pub ibx_evl_scr_prce_num: Option<f64>,
    pub ibx_evl_scr_ovrl_num: Option<f64>,
    pub sfbr_slctn_ord: Option<String>,
    pub sfbr_slctn_rslt_cd: Option<String>,
}

impl OpeningResult {
    /// Result rows rarely repeat the notice key; the requested one fills it.
    pub fn build(notice: &NoticeKey, raw: &RawRow) -> Result<Self, ValidationError> {
        let mut fields = OPENING_RESULT_FIELDS.apply(raw);
        fields.insert_missing("bid_pbanc_no", notice.bid_pbanc_no.as_str());
        fields.insert_missing("bid_pbanc_ord", notice.bid_pbanc_ord.as_str());
        fields.insert_missing("bid_clsf_no", notice.bid_clsf_no.clone());
        fields.insert_missing("bid_prgrs_ord", notice.bid_prgrs_ord.clone());
        Self::from_fields(&fields)
    }

    pub fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        let ibx_bdng_amt = f.required_int("ibx_bdng_amt")?;
        if ibx_bdng_amt < 0 {
            return Err(ValidationError::constraint(
                f.record(),
                "ibx_bdng_amt",
                format!("bid amount must not be negative, got {ibx_bdng_amt}"),
            ));
        }

        Ok(Self {
            bid_pbanc_no: f.required_str("bid_pbanc_no")?,
            bid_pbanc_ord: f.required_str("bid_pbanc_ord")?,
            bid_clsf_no: f.opt_str("bid_clsf_no"),
            bid_prgrs_ord: f.opt_str("bid_prgrs_ord"),
            ibx_onbs_rnkg: f.required_int("ibx_onbs_rnkg")?,
            ibx_grp_nm: f.required_name("ibx_grp_nm")?,
            ibx_bdng_amt,
            ibx_slpr_rcptn_dt: f.required_timestamp("ibx_slpr_rcptn_dt")?,
            ibx_bzmn_reg_no: f.opt_biz_reg_no("ibx_bzmn_reg_no"),
            ibx_rprsv_nm: f.opt_name("ibx_rprsv_nm"),
            bidr_prsn_no: f.opt_str("bidr_prsn_no"),
            bidr_prsn_nm: f.opt_name("bidr_prsn_nm"),
            bid_ufns_rsn_cd: f.opt_str("bid_ufns_rsn_cd"),
            bid_ufns_rsn_nm: f.opt_str("bid_ufns_rsn_nm"),
            ufns_yn: f.opt_flag("ufns_yn"),
            ibx_evl_scr_prpl: f.opt_str("ibx_evl_scr_prpl"),
            ibx_evl_scr_prce: f.opt_str("ibx_evl_scr_prce"),
            ibx_evl_scr_ovrl: f.opt_str("ibx_evl_scr_ovrl"),
            ibx_evl_scr_prpl_num: score(f, "ibx_evl_scr_prpl_num", "ibx_evl_scr_prpl")?,
            ibx_evl_scr_prce_num: score(f, "ibx_evl_scr_prce_num", "ibx_evl_scr_prce")?,
            ibx_evl_scr_ovrl_num: score(f, "ibx_evl_scr_ovrl_num", "ibx_evl_scr_ovrl")?,
            sfbr_slctn_ord: f.opt_str("sfbr_slctn_ord"),
            sfbr_slctn_rslt_cd: f.opt_str("sfbr_slctn_rslt_cd"),
        })
    }
}

/// Numeric score: the explicit numeric field must parse, the textual one
/// is only a best-effort source (it sometimes holds labels like "-").
fn score(
    f: &Fields,
    numeric: &'static str,
    text: &'static str,
) -> Result<Option<f64>, ValidationError> {
    if let Some(value) = f.opt_decimal(numeric)? {
        return Ok(Some(value));
    }
    Ok(f.text(text).and_then(|s| parse_decimal(&s).ok().flatten()))
}

impl Record for OpeningResult {
    const COLLECTION: Collection = Collection::OpeningResult;

    fn unique_key(&self) -> Vec<String> {
        vec![
            self.bid_pbanc_no.clone(),
            self.bid_pbanc_ord.clone(),
            self.bid_clsf_no.clone().unwrap_or_default(),
            self.bid_prgrs_ord.clone().unwrap_or_default(),
            self.ibx_onbs_rnkg.to_string(),
        ]
    }
}
