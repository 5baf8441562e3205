//! Listing rows, notice details and notice-update posts.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::mapping::{
    DETAIL_FIELDS, Fields, LIST_FIELDS, NOTICE_UPDATE_FIELDS, OPENING_SUMMARY_FIELDS, RawRow,
};
use super::normalize::TIMESTAMP_FORMAT;
use super::record::{Collection, NoticeKey, Record, timestamp};
use super::validation::ValidationError;

/// One row of the paged listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    pub bid_pbanc_no: String,
    pub bid_pbanc_ord: String,
    pub bid_clsf_no: Option<String>,
    pub bid_prgrs_ord: Option<String>,
    pub bid_pbanc_nm: String,
    pub bid_pbanc_num: String,
    pub pbanc_stts_cd: String,
    pub pbanc_stts_cd_nm: String,
    pub prcm_bsne_se_cd: String,
    pub prcm_bsne_se_cd_nm: String,
    pub bid_mthd_cd: String,
    pub bid_mthd_cd_nm: String,
    pub std_ctrt_mthd_cd: String,
    pub std_ctrt_mthd_cd_nm: String,
    pub scsbd_mthd_cd: String,
    pub scsbd_mthd_cd_nm: String,
    pub grp_nm: String,
    #[serde(serialize_with = "timestamp::serialize")]
    pub pbanc_pstg_dt: NaiveDateTime,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub slpr_rcpt_ddln_dt: Option<NaiveDateTime>,
    pub pbanc_knd_cd: String,
    pub pbanc_knd_cd_nm: String,
    pub pbanc_stts_grid_cd_nm: String,
    pub row_num: i64,
    pub tot_cnt: i64,
    pub current_page: i64,
    pub record_count_per_page: i64,
    pub next_row_yn: Option<bool>,
    // Present only on some rows; portal quirks.
    pub edoc_no: Option<String>,
    pub usr_doc_no_val: Option<String>,
    pub pbanc_inst_unty_grp_no: Option<String>,
    pub pbanc_pstg_yn: Option<bool>,
    pub pbanc_dscr_trgt_yn: Option<bool>,
    pub slpr_rcpt_bgng_yn: Option<bool>,
    pub slpr_rcpt_ddln_yn: Option<bool>,
    pub onbs_prnmnt_yn: Option<bool>,
    pub bid_qlfc_end_yn: Option<bool>,
    pub pbanc_bfss_yn: Option<bool>,
    pub bid_pbanc_pgst_cd: Option<String>,
    pub bid_pbanc_pgst_cd_nm: Option<String>,
    pub sfbr_slctn_ord: Option<String>,
    pub sfbr_slctn_rslt_cd: Option<String>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub doc_sbmsn_ddln_dt: Option<NaiveDateTime>,
    pub cvln_qlem_crtr_no: Option<String>,
    pub cvln_qlem_pgst_cd: Option<String>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub objtdmd_term_dt: Option<NaiveDateTime>,
    pub bdng_amt_yn_nm: Option<String>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub slpr_rcpt_ddln_dt1: Option<NaiveDateTime>,
}

impl ListItem {
    /// Map a raw listing row and validate it.
    pub fn from_raw(raw: &RawRow) -> Result<Self, ValidationError> {
        Self::from_fields(&LIST_FIELDS.apply(raw))
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
            prcm_bsne_se_cd: f.required_str("prcm_bsne_se_cd")?,
            prcm_bsne_se_cd_nm: f.required_str("prcm_bsne_se_cd_nm")?,
            bid_mthd_cd: f.required_str("bid_mthd_cd")?,
            bid_mthd_cd_nm: f.required_str("bid_mthd_cd_nm")?,
            std_ctrt_mthd_cd: f.required_str("std_ctrt_mthd_cd")?,
            std_ctrt_mthd_cd_nm: f.required_str("std_ctrt_mthd_cd_nm")?,
            scsbd_mthd_cd: f.required_str("scsbd_mthd_cd")?,
            scsbd_mthd_cd_nm: f.required_str("scsbd_mthd_cd_nm")?,
            grp_nm: f.required_name("grp_nm")?,
            pbanc_pstg_dt: f.required_timestamp("pbanc_pstg_dt")?,
            slpr_rcpt_ddln_dt: f.opt_timestamp("slpr_rcpt_ddln_dt")?,
            pbanc_knd_cd: f.required_str("pbanc_knd_cd")?,
            pbanc_knd_cd_nm: f.required_str("pbanc_knd_cd_nm")?,
            pbanc_stts_grid_cd_nm: f.required_str("pbanc_stts_grid_cd_nm")?,
            row_num: f.required_int("row_num")?,
            tot_cnt: f.required_int("tot_cnt")?,
            current_page: f.required_int("current_page")?,
            record_count_per_page: f.required_int("record_count_per_page")?,
            next_row_yn: f.opt_flag("next_row_yn"),
            edoc_no: f.opt_doc_no("edoc_no"),
            usr_doc_no_val: f.opt_doc_no("usr_doc_no_val"),
            pbanc_inst_unty_grp_no: f.opt_str("pbanc_inst_unty_grp_no"),
            pbanc_pstg_yn: f.opt_flag("pbanc_pstg_yn"),
            pbanc_dscr_trgt_yn: f.opt_flag("pbanc_dscr_trgt_yn"),
            slpr_rcpt_bgng_yn: f.opt_flag("slpr_rcpt_bgng_yn"),
            slpr_rcpt_ddln_yn: f.opt_flag("slpr_rcpt_ddln_yn"),
            onbs_prnmnt_yn: f.opt_flag("onbs_prnmnt_yn"),
            bid_qlfc_end_yn: f.opt_flag("bid_qlfc_end_yn"),
            pbanc_bfss_yn: f.opt_flag("pbanc_bfss_yn"),
            bid_pbanc_pgst_cd: f.opt_str("bid_pbanc_pgst_cd"),
            bid_pbanc_pgst_cd_nm: f.opt_str("bid_pbanc_pgst_cd_nm"),
            sfbr_slctn_ord: f.opt_str("sfbr_slctn_ord"),
            sfbr_slctn_rslt_cd: f.opt_str("sfbr_slctn_rslt_cd"),
            doc_sbmsn_ddln_dt: f.opt_timestamp("doc_sbmsn_ddln_dt")?,
            cvln_qlem_crtr_no: f.opt_str("cvln_qlem_crtr_no"),
            cvln_qlem_pgst_cd: f.opt_str("cvln_qlem_pgst_cd"),
            objtdmd_term_dt: f.opt_timestamp("objtdmd_term_dt")?,
            bdng_amt_yn_nm: f.opt_str("bdng_amt_yn_nm"),
            slpr_rcpt_ddln_dt1: f.opt_timestamp("slpr_rcpt_ddln_dt1")?,
        })
    }

    pub fn notice_key(&self) -> NoticeKey {
        NoticeKey {
            bid_pbanc_no: self.bid_pbanc_no.clone(),
            bid_pbanc_ord: self.bid_pbanc_ord.clone(),
            bid_clsf_no: self.bid_clsf_no.clone(),
            bid_prgrs_ord: self.bid_prgrs_ord.clone(),
        }
    }

    /// The fields a detail record inherits when the detail API omits them.
    pub fn detail_fallback(&self) -> Fields {
        let mut f = Fields::new(DETAIL_FIELDS.record);
        f.insert("bid_pbanc_no", self.bid_pbanc_no.as_str());
        f.insert("bid_pbanc_ord", self.bid_pbanc_ord.as_str());
        f.insert("bid_clsf_no", self.bid_clsf_no.clone());
        f.insert("bid_prgrs_ord", self.bid_prgrs_ord.clone());
        f.insert("bid_pbanc_nm", self.bid_pbanc_nm.as_str());
        f.insert("bid_pbanc_num", self.bid_pbanc_num.as_str());
        f.insert("pbanc_stts_cd", self.pbanc_stts_cd.as_str());
        f.insert("pbanc_stts_cd_nm", self.pbanc_stts_cd_nm.as_str());
        f.insert("prcm_bsne_se_cd", self.prcm_bsne_se_cd.as_str());
        f.insert("prcm_bsne_se_cd_nm", self.prcm_bsne_se_cd_nm.as_str());
        f.insert("bid_mthd_cd", self.bid_mthd_cd.as_str());
        f.insert("bid_mthd_cd_nm", self.bid_mthd_cd_nm.as_str());
        f.insert("std_ctrt_mthd_cd", self.std_ctrt_mthd_cd.as_str());
        f.insert("std_ctrt_mthd_cd_nm", self.std_ctrt_mthd_cd_nm.as_str());
        f.insert("scsbd_mthd_cd", self.scsbd_mthd_cd.as_str());
        f.insert("scsbd_mthd_cd_nm", self.scsbd_mthd_cd_nm.as_str());
        f.insert("grp_nm", self.grp_nm.as_str());
        f.insert("pbanc_inst_unty_grp_no", self.pbanc_inst_unty_grp_no.clone());
        f.insert("pbanc_pstg_dt", format_ts(Some(self.pbanc_pstg_dt)));
        f.insert("slpr_rcpt_ddln_dt", format_ts(self.slpr_rcpt_ddln_dt));
        f.insert("edoc_no", self.edoc_no.clone());
        f.insert("usr_doc_no_val", self.usr_doc_no_val.clone());
        f.insert("pbanc_pstg_yn", self.pbanc_pstg_yn);
        f
    }
}

impl Record for ListItem {
    const COLLECTION: Collection = Collection::List;

    fn unique_key(&self) -> Vec<String> {
        vec![self.bid_pbanc_no.clone(), self.bid_pbanc_ord.clone()]
    }
}

/// Full notice detail, one per notice phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailItem {
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
    pub pic_id: Option<String>,
    pub pic_id_nm: Option<String>,
    pub bid_blff_id: Option<String>,
    pub bid_blff_id_nm: Option<String>,
    pub bsne_tlph_no: Option<String>,
    pub bsne_fax_no: Option<String>,
    pub bsne_eml: Option<String>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub pbanc_pstg_dt: Option<NaiveDateTime>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub slpr_rcpt_bgng_dt: Option<NaiveDateTime>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub slpr_rcpt_ddln_dt: Option<NaiveDateTime>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub onbs_prnmnt_dt: Option<NaiveDateTime>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub bid_qlfc_reg_dt: Option<NaiveDateTime>,
    pub onbs_plac_nm: Option<String>,
    pub zip: Option<String>,
    pub base_addr: Option<String>,
    pub dtl_addr: Option<String>,
    pub unty_addr: Option<String>,
    pub edoc_no: Option<String>,
    pub usr_doc_no_val: Option<String>,
    pub rbid_prms_yn: Option<bool>,
    pub pbanc_pstg_yn: Option<bool>,
    pub rgn_lmt_yn: Option<bool>,
    pub lcns_lmt_yn: Option<bool>,
    pub pnpr_use_yn: Option<bool>,
    pub pnpr_rls_yn: Option<bool>,
    pub unty_atch_file_no: Option<String>,
}

impl DetailItem {
    /// Merge the detail API row over what the listing already told us.
    /// Non-blank detail values always win.
    pub fn build(list: &ListItem, detail: &RawRow) -> Result<Self, ValidationError> {
        let mut fields = list.detail_fallback();
        fields.overlay(DETAIL_FIELDS.apply(detail));
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
            pic_id: f.opt_str("pic_id"),
            pic_id_nm: f.opt_name("pic_id_nm"),
            bid_blff_id: f.opt_str("bid_blff_id"),
            bid_blff_id_nm: f.opt_name("bid_blff_id_nm"),
            bsne_tlph_no: f.opt_str("bsne_tlph_no"),
            bsne_fax_no: f.opt_str("bsne_fax_no"),
            bsne_eml: f.opt_str("bsne_eml"),
            pbanc_pstg_dt: f.opt_timestamp("pbanc_pstg_dt")?,
            slpr_rcpt_bgng_dt: f.opt_timestamp("slpr_rcpt_bgng_dt")?,
            slpr_rcpt_ddln_dt: f.opt_timestamp("slpr_rcpt_ddln_dt")?,
            onbs_prnmnt_dt: f.opt_timestamp("onbs_prnmnt_dt")?,
            bid_qlfc_reg_dt: f.opt_timestamp("bid_qlfc_reg_dt")?,
            onbs_plac_nm: f.opt_name("onbs_plac_nm"),
            zip: f.opt_str("zip"),
            base_addr: f.opt_str("base_addr"),
            dtl_addr: f.opt_str("dtl_addr"),
            unty_addr: f.opt_str("unty_addr"),
            edoc_no: f.opt_doc_no("edoc_no"),
            usr_doc_no_val: f.opt_doc_no("usr_doc_no_val"),
            rbid_prms_yn: f.opt_flag("rbid_prms_yn"),
            pbanc_pstg_yn: f.opt_flag("pbanc_pstg_yn"),
            rgn_lmt_yn: f.opt_flag("rgn_lmt_yn"),
            lcns_lmt_yn: f.opt_flag("lcns_lmt_yn"),
            pnpr_use_yn: f.opt_flag("pnpr_use_yn"),
            pnpr_rls_yn: f.opt_flag("pnpr_rls_yn"),
            unty_atch_file_no: f.opt_str("unty_atch_file_no"),
        })
    }

    pub fn notice_key(&self) -> NoticeKey {
        NoticeKey {
            bid_pbanc_no: self.bid_pbanc_no.clone(),
            bid_pbanc_ord: self.bid_pbanc_ord.clone(),
            bid_clsf_no: self.bid_clsf_no.clone(),
            bid_prgrs_ord: self.bid_prgrs_ord.clone(),
        }
    }

    /// Fields an opening summary inherits when the opening API omits them.
    pub fn opening_fallback(&self) -> Fields {
        let mut f = Fields::new(OPENING_SUMMARY_FIELDS.record);
        f.insert("bid_pbanc_no", self.bid_pbanc_no.as_str());
        f.insert("bid_pbanc_ord", self.bid_pbanc_ord.as_str());
        f.insert("bid_clsf_no", self.bid_clsf_no.clone());
        f.insert("bid_prgrs_ord", self.bid_prgrs_ord.clone());
        f.insert("bid_pbanc_nm", self.bid_pbanc_nm.as_str());
        f.insert("bid_pbanc_num", self.bid_pbanc_num.as_str());
        f.insert("pbanc_stts_cd", self.pbanc_stts_cd.as_str());
        f.insert("pbanc_stts_cd_nm", self.pbanc_stts_cd_nm.as_str());
        f
    }
}

impl Record for DetailItem {
    const COLLECTION: Collection = Collection::Detail;

    fn unique_key(&self) -> Vec<String> {
        self.notice_key().phase_key()
    }
}

/// A post on a notice's change/announcement board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticeUpdateItem {
    pub pst_no: String,
    pub bbs_no: String,
    pub bid_pbanc_no: Option<String>,
    pub bid_pbanc_ord: Option<String>,
    pub pst_ttl: String,
    pub unty_atch_file_no: Option<String>,
    pub use_yn: Option<bool>,
    #[serde(serialize_with = "timestamp::serialize_opt")]
    pub inpt_dt: Option<NaiveDateTime>,
    pub pst_cn: Option<String>,
}

impl NoticeUpdateItem {
    /// Posts do not always repeat the notice they belong to; fill it in.
    pub fn build(notice: &NoticeKey, raw: &RawRow) -> Result<Self, ValidationError> {
        let mut fields = NOTICE_UPDATE_FIELDS.apply(raw);
        fields.insert_missing("bid_pbanc_no", notice.bid_pbanc_no.as_str());
        fields.insert_missing("bid_pbanc_ord", notice.bid_pbanc_ord.as_str());
        Self::from_fields(&fields)
    }

    pub fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            pst_no: f.required_str("pst_no")?,
            bbs_no: f.required_str("bbs_no")?,
            bid_pbanc_no: f.opt_str("bid_pbanc_no"),
            bid_pbanc_ord: f.opt_str("bid_pbanc_ord"),
            pst_ttl: f.required_name("pst_ttl")?,
            unty_atch_file_no: f.opt_str("unty_atch_file_no"),
            use_yn: f.opt_flag("use_yn"),
            inpt_dt: f.opt_timestamp("inpt_dt")?,
            pst_cn: f.opt_name("pst_cn"),
        })
    }
}

impl Record for NoticeUpdateItem {
    const COLLECTION: Collection = Collection::NoticeUpdate;

    fn unique_key(&self) -> Vec<String> {
        vec![self.pst_no.clone(), self.bbs_no.clone()]
    }
}

fn format_ts(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
}
