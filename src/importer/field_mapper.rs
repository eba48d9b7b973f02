// ==========================================
// NIH ExPORTER 导入系统 - 标签映射表
// ==========================================
// 职责: XML 标签名 → 记录字段（一次构建，编译期检查字段访问）
// 约定: 标签名小写后与字段名一一对应；结构性标签单独分类
// ==========================================

use crate::domain::NihAward;
use std::collections::HashMap;
use std::sync::OnceLock;

// ===== 结构性标签 =====
pub const ROW_TAG: &str = "row";
pub const PI_GROUP_TAG: &str = "PI";
pub const PI_LIST_TAG: &str = "PIS";
pub const PI_NAME_TAG: &str = "PI_NAME";
pub const PI_ID_TAG: &str = "PI_ID";
pub const TERM_LIST_TAG: &str = "PROJECT_TERMSX";
pub const TERM_TAG: &str = "TERM";

// ==========================================
// ScalarField - 可直接赋值的标量字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    ApplicationId,
    Activity,
    AdministeringIc,
    ApplicationType,
    ArraFunded,
    AwardNoticeDate,
    BudgetStart,
    BudgetEnd,
    CfdaCode,
    CoreProjectNum,
    EdInstType,
    FoaNumber,
    FullProjectNum,
    FundingIcs,
    FundingMechanism,
    Fy,
    IcName,
    NihSpendingCats,
    OrgCity,
    OrgCountry,
    OrgDept,
    OrgDistrict,
    OrgDuns,
    OrgFips,
    OrgName,
    OrgState,
    OrgZipcode,
    Phr,
    ProgramOfficerName,
    ProjectStart,
    ProjectEnd,
    ProjectTitle,
    SerialNumber,
    StudySection,
    StudySectionName,
    SubprojectId,
    Suffix,
    SupportYear,
    TotalCost,
    TotalCostSubProject,
}

impl ScalarField {
    pub const ALL: [ScalarField; 40] = [
        ScalarField::ApplicationId,
        ScalarField::Activity,
        ScalarField::AdministeringIc,
        ScalarField::ApplicationType,
        ScalarField::ArraFunded,
        ScalarField::AwardNoticeDate,
        ScalarField::BudgetStart,
        ScalarField::BudgetEnd,
        ScalarField::CfdaCode,
        ScalarField::CoreProjectNum,
        ScalarField::EdInstType,
        ScalarField::FoaNumber,
        ScalarField::FullProjectNum,
        ScalarField::FundingIcs,
        ScalarField::FundingMechanism,
        ScalarField::Fy,
        ScalarField::IcName,
        ScalarField::NihSpendingCats,
        ScalarField::OrgCity,
        ScalarField::OrgCountry,
        ScalarField::OrgDept,
        ScalarField::OrgDistrict,
        ScalarField::OrgDuns,
        ScalarField::OrgFips,
        ScalarField::OrgName,
        ScalarField::OrgState,
        ScalarField::OrgZipcode,
        ScalarField::Phr,
        ScalarField::ProgramOfficerName,
        ScalarField::ProjectStart,
        ScalarField::ProjectEnd,
        ScalarField::ProjectTitle,
        ScalarField::SerialNumber,
        ScalarField::StudySection,
        ScalarField::StudySectionName,
        ScalarField::SubprojectId,
        ScalarField::Suffix,
        ScalarField::SupportYear,
        ScalarField::TotalCost,
        ScalarField::TotalCostSubProject,
    ];

    /// 字段名（= 小写标签名 = 列名）
    pub fn name(self) -> &'static str {
        match self {
            ScalarField::ApplicationId => "application_id",
            ScalarField::Activity => "activity",
            ScalarField::AdministeringIc => "administering_ic",
            ScalarField::ApplicationType => "application_type",
            ScalarField::ArraFunded => "arra_funded",
            ScalarField::AwardNoticeDate => "award_notice_date",
            ScalarField::BudgetStart => "budget_start",
            ScalarField::BudgetEnd => "budget_end",
            ScalarField::CfdaCode => "cfda_code",
            ScalarField::CoreProjectNum => "core_project_num",
            ScalarField::EdInstType => "ed_inst_type",
            ScalarField::FoaNumber => "foa_number",
            ScalarField::FullProjectNum => "full_project_num",
            ScalarField::FundingIcs => "funding_ics",
            ScalarField::FundingMechanism => "funding_mechanism",
            ScalarField::Fy => "fy",
            ScalarField::IcName => "ic_name",
            ScalarField::NihSpendingCats => "nih_spending_cats",
            ScalarField::OrgCity => "org_city",
            ScalarField::OrgCountry => "org_country",
            ScalarField::OrgDept => "org_dept",
            ScalarField::OrgDistrict => "org_district",
            ScalarField::OrgDuns => "org_duns",
            ScalarField::OrgFips => "org_fips",
            ScalarField::OrgName => "org_name",
            ScalarField::OrgState => "org_state",
            ScalarField::OrgZipcode => "org_zipcode",
            ScalarField::Phr => "phr",
            ScalarField::ProgramOfficerName => "program_officer_name",
            ScalarField::ProjectStart => "project_start",
            ScalarField::ProjectEnd => "project_end",
            ScalarField::ProjectTitle => "project_title",
            ScalarField::SerialNumber => "serial_number",
            ScalarField::StudySection => "study_section",
            ScalarField::StudySectionName => "study_section_name",
            ScalarField::SubprojectId => "subproject_id",
            ScalarField::Suffix => "suffix",
            ScalarField::SupportYear => "support_year",
            ScalarField::TotalCost => "total_cost",
            ScalarField::TotalCostSubProject => "total_cost_sub_project",
        }
    }

    /// 字段的可变引用
    fn slot(self, award: &mut NihAward) -> &mut String {
        match self {
            ScalarField::ApplicationId => &mut award.application_id,
            ScalarField::Activity => &mut award.activity,
            ScalarField::AdministeringIc => &mut award.administering_ic,
            ScalarField::ApplicationType => &mut award.application_type,
            ScalarField::ArraFunded => &mut award.arra_funded,
            ScalarField::AwardNoticeDate => &mut award.award_notice_date,
            ScalarField::BudgetStart => &mut award.budget_start,
            ScalarField::BudgetEnd => &mut award.budget_end,
            ScalarField::CfdaCode => &mut award.cfda_code,
            ScalarField::CoreProjectNum => &mut award.core_project_num,
            ScalarField::EdInstType => &mut award.ed_inst_type,
            ScalarField::FoaNumber => &mut award.foa_number,
            ScalarField::FullProjectNum => &mut award.full_project_num,
            ScalarField::FundingIcs => &mut award.funding_ics,
            ScalarField::FundingMechanism => &mut award.funding_mechanism,
            ScalarField::Fy => &mut award.fy,
            ScalarField::IcName => &mut award.ic_name,
            ScalarField::NihSpendingCats => &mut award.nih_spending_cats,
            ScalarField::OrgCity => &mut award.org_city,
            ScalarField::OrgCountry => &mut award.org_country,
            ScalarField::OrgDept => &mut award.org_dept,
            ScalarField::OrgDistrict => &mut award.org_district,
            ScalarField::OrgDuns => &mut award.org_duns,
            ScalarField::OrgFips => &mut award.org_fips,
            ScalarField::OrgName => &mut award.org_name,
            ScalarField::OrgState => &mut award.org_state,
            ScalarField::OrgZipcode => &mut award.org_zipcode,
            ScalarField::Phr => &mut award.phr,
            ScalarField::ProgramOfficerName => &mut award.program_officer_name,
            ScalarField::ProjectStart => &mut award.project_start,
            ScalarField::ProjectEnd => &mut award.project_end,
            ScalarField::ProjectTitle => &mut award.project_title,
            ScalarField::SerialNumber => &mut award.serial_number,
            ScalarField::StudySection => &mut award.study_section,
            ScalarField::StudySectionName => &mut award.study_section_name,
            ScalarField::SubprojectId => &mut award.subproject_id,
            ScalarField::Suffix => &mut award.suffix,
            ScalarField::SupportYear => &mut award.support_year,
            ScalarField::TotalCost => &mut award.total_cost,
            ScalarField::TotalCostSubProject => &mut award.total_cost_sub_project,
        }
    }

    /// 赋值（后出现的同名标签覆盖先前的值）
    pub fn assign(self, award: &mut NihAward, value: String) {
        *self.slot(award) = value;
    }
}

// ==========================================
// TagKind - 标签分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// 行边界
    Row,
    /// 单个 PI 组边界
    InvestigatorGroup,
    InvestigatorName,
    InvestigatorId,
    Term,
    /// 列表容器（PIS / PROJECT_TERMSX），自身不携带值
    Container,
    Scalar(ScalarField),
    /// 未知标签（根元素、新增列等），忽略
    Unknown,
}

fn scalar_table() -> &'static HashMap<&'static str, ScalarField> {
    static TABLE: OnceLock<HashMap<&'static str, ScalarField>> = OnceLock::new();
    TABLE.get_or_init(|| ScalarField::ALL.iter().map(|f| (f.name(), *f)).collect())
}

// ==========================================
// FieldMapper - 标签分类器
// ==========================================
pub struct FieldMapper;

impl FieldMapper {
    /// 对标签名分类
    pub fn classify(tag: &str) -> TagKind {
        match tag {
            ROW_TAG => TagKind::Row,
            PI_GROUP_TAG => TagKind::InvestigatorGroup,
            PI_NAME_TAG => TagKind::InvestigatorName,
            PI_ID_TAG => TagKind::InvestigatorId,
            TERM_TAG => TagKind::Term,
            PI_LIST_TAG | TERM_LIST_TAG => TagKind::Container,
            _ => match Self::scalar_field(tag) {
                Some(field) => TagKind::Scalar(field),
                None => TagKind::Unknown,
            },
        }
    }

    /// 按小写标签名查找标量字段
    pub fn scalar_field(tag: &str) -> Option<ScalarField> {
        scalar_table().get(tag.to_ascii_lowercase().as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_field_has_unique_name() {
        assert_eq!(scalar_table().len(), ScalarField::ALL.len());
    }

    #[test]
    fn test_classify_structural_tags() {
        assert_eq!(FieldMapper::classify("row"), TagKind::Row);
        assert_eq!(FieldMapper::classify("PI"), TagKind::InvestigatorGroup);
        assert_eq!(FieldMapper::classify("PI_NAME"), TagKind::InvestigatorName);
        assert_eq!(FieldMapper::classify("PI_ID"), TagKind::InvestigatorId);
        assert_eq!(FieldMapper::classify("TERM"), TagKind::Term);
        assert_eq!(FieldMapper::classify("PIS"), TagKind::Container);
        assert_eq!(FieldMapper::classify("PROJECT_TERMSX"), TagKind::Container);
        assert_eq!(FieldMapper::classify("PROJECTS"), TagKind::Unknown);
    }

    #[test]
    fn test_scalar_lookup_is_case_normalized() {
        assert_eq!(
            FieldMapper::classify("APPLICATION_ID"),
            TagKind::Scalar(ScalarField::ApplicationId)
        );
        assert_eq!(
            FieldMapper::classify("Total_Cost_Sub_Project"),
            TagKind::Scalar(ScalarField::TotalCostSubProject)
        );
    }

    #[test]
    fn test_assign_writes_named_field() {
        let mut award = NihAward::default();
        ScalarField::OrgState.assign(&mut award, "MD".to_string());
        ScalarField::ProjectTitle.assign(&mut award, "Tumor biology".to_string());

        assert_eq!(award.org_state, "MD");
        assert_eq!(award.project_title, "Tumor biology");
        assert!(award.org_city.is_empty());
    }
}
