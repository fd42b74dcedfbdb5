use serde::Serialize;

use super::groups::FlowsheetGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Numeric,
    Text,
    Select,
    Multiselect,
    Datetime,
}

/// Definition of a flowsheet row: where it sits and what it accepts.
///
/// Template rows are shown even before anything is charted against them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowTemplate {
    pub id: u32,
    /// Id of the owning flowsheet group.
    pub group: &'static str,
    pub section: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub data_type: DataType,
    pub unit: Option<&'static str>,
    pub options: &'static [&'static str],
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub is_required: bool,
    pub display_order: u32,
}

const BASE: RowTemplate = RowTemplate {
    id: 0,
    group: "",
    section: "",
    name: "",
    category: "",
    data_type: DataType::Text,
    unit: None,
    options: &[],
    min_value: None,
    max_value: None,
    is_required: false,
    display_order: 0,
};

static TEMPLATES: &[RowTemplate] = &[
    // Post Partum Hemorrhage
    RowTemplate {
        id: 1,
        group: "post_partum_hemorrhage",
        section: "Vitals",
        name: "BP",
        category: "Vitals",
        is_required: true,
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 2,
        group: "post_partum_hemorrhage",
        section: "Vitals",
        name: "Heart Rate",
        category: "Vitals",
        data_type: DataType::Numeric,
        unit: Some("bpm"),
        min_value: Some(20.0),
        max_value: Some(250.0),
        is_required: true,
        display_order: 2,
        ..BASE
    },
    RowTemplate {
        id: 3,
        group: "post_partum_hemorrhage",
        section: "Vitals",
        name: "SpO2",
        category: "Vitals",
        data_type: DataType::Numeric,
        unit: Some("%"),
        min_value: Some(50.0),
        max_value: Some(100.0),
        display_order: 3,
        ..BASE
    },
    RowTemplate {
        id: 4,
        group: "post_partum_hemorrhage",
        section: "Vitals",
        name: "Temp",
        category: "Vitals",
        data_type: DataType::Numeric,
        unit: Some("C"),
        min_value: Some(30.0),
        max_value: Some(43.0),
        display_order: 4,
        ..BASE
    },
    RowTemplate {
        id: 5,
        group: "post_partum_hemorrhage",
        section: "Events",
        name: "Delivery Time",
        category: "Event",
        data_type: DataType::Datetime,
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 6,
        group: "post_partum_hemorrhage",
        section: "Documentation",
        name: "Hemorrhage Stage",
        category: "Assessment",
        data_type: DataType::Select,
        options: &["Stage 0", "Stage 1", "Stage 2", "Stage 3"],
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 7,
        group: "post_partum_hemorrhage",
        section: "Bleeding Assessment Summary",
        name: "QBL",
        category: "Assessment",
        data_type: DataType::Numeric,
        unit: Some("mL"),
        min_value: Some(0.0),
        is_required: true,
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 8,
        group: "post_partum_hemorrhage",
        section: "Bleeding Assessment Summary",
        name: "Fundal Tone",
        category: "Assessment",
        data_type: DataType::Select,
        options: &["Firm", "Boggy", "Firm with massage"],
        display_order: 2,
        ..BASE
    },
    RowTemplate {
        id: 9,
        group: "post_partum_hemorrhage",
        section: "Interventions",
        name: "Fundal Massage",
        category: "Intervention",
        data_type: DataType::Select,
        options: &["Done", "Not done"],
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 10,
        group: "post_partum_hemorrhage",
        section: "Interventions",
        name: "Uterotonic Given",
        category: "Intervention",
        data_type: DataType::Multiselect,
        options: &["Oxytocin", "Methylergonovine", "Carboprost", "Misoprostol"],
        display_order: 2,
        ..BASE
    },
    // Intake/Output
    RowTemplate {
        id: 20,
        group: "intake_output",
        section: "Intake",
        name: "PO",
        category: "Intake",
        data_type: DataType::Numeric,
        unit: Some("mL"),
        min_value: Some(0.0),
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 21,
        group: "intake_output",
        section: "Intake",
        name: "IV",
        category: "Intake",
        data_type: DataType::Numeric,
        unit: Some("mL"),
        min_value: Some(0.0),
        display_order: 2,
        ..BASE
    },
    RowTemplate {
        id: 22,
        group: "intake_output",
        section: "Output",
        name: "Urine",
        category: "Output",
        data_type: DataType::Numeric,
        unit: Some("mL"),
        min_value: Some(0.0),
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 23,
        group: "intake_output",
        section: "Output",
        name: "Emesis",
        category: "Output",
        data_type: DataType::Numeric,
        unit: Some("mL"),
        min_value: Some(0.0),
        display_order: 2,
        ..BASE
    },
    RowTemplate {
        id: 24,
        group: "intake_output",
        section: "Balance",
        name: "Net",
        category: "Balance",
        data_type: DataType::Numeric,
        unit: Some("mL"),
        display_order: 1,
        ..BASE
    },
    // Pastoral Services
    RowTemplate {
        id: 30,
        group: "pastoral_services",
        section: "Reason For Visit",
        name: "Reason",
        category: "Visit",
        data_type: DataType::Select,
        options: &["Routine", "Patient request", "Family request", "End of life"],
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 31,
        group: "pastoral_services",
        section: "Visit Information",
        name: "Visit Type",
        category: "Visit",
        data_type: DataType::Select,
        options: &["Initial", "Follow-up"],
        display_order: 1,
        ..BASE
    },
    // Nursing Assessment
    RowTemplate {
        id: 40,
        group: "nursing_assessment",
        section: "Neurological",
        name: "LOC",
        category: "Assessment",
        data_type: DataType::Select,
        options: &["Alert", "Verbal", "Pain", "Unresponsive"],
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 41,
        group: "nursing_assessment",
        section: "Cardiovascular",
        name: "Rhythm",
        category: "Assessment",
        data_type: DataType::Select,
        options: &["Regular", "Irregular"],
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 42,
        group: "nursing_assessment",
        section: "Respiratory",
        name: "Breath Sounds",
        category: "Assessment",
        display_order: 1,
        ..BASE
    },
    RowTemplate {
        id: 43,
        group: "nursing_assessment",
        section: "Skin",
        name: "Skin Integrity",
        category: "Assessment",
        display_order: 1,
        ..BASE
    },
];

/// Filter for the template listing; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFilter<'a> {
    pub group: Option<&'a FlowsheetGroup>,
    pub section: Option<&'a str>,
    pub category: Option<&'a str>,
}

impl TemplateFilter<'_> {
    fn matches(&self, template: &RowTemplate) -> bool {
        self.group.map_or(true, |g| g.id == template.group)
            && self.section.map_or(true, |s| s == template.section)
            && self.category.map_or(true, |c| c == template.category)
    }
}

pub fn all() -> &'static [RowTemplate] {
    TEMPLATES
}

/// Templates matching `filter`, ordered by display order.
pub fn find(filter: &TemplateFilter<'_>) -> Vec<&'static RowTemplate> {
    let mut found: Vec<_> = TEMPLATES.iter().filter(|t| filter.matches(t)).collect();
    found.sort_by_key(|t| t.display_order);
    found
}

/// Template rows of a group in presentation order: catalog section order,
/// then display order within the section.
pub fn for_group(group: &FlowsheetGroup) -> Vec<&'static RowTemplate> {
    let mut rows: Vec<_> = TEMPLATES.iter().filter(|t| t.group == group.id).collect();
    rows.sort_by_key(|t| {
        let section = group
            .sections
            .iter()
            .position(|s| *s == t.section)
            .unwrap_or(group.sections.len());
        (section, t.display_order)
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowsheet::groups;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_template_belongs_to_a_catalog_section() {
        for template in all() {
            let group = groups::find(template.group)
                .unwrap_or_else(|| panic!("unknown group {}", template.group));
            assert!(
                group.sections.contains(&template.section),
                "{} not a section of {}",
                template.section,
                group.name
            );
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = all().iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), all().len());
    }

    #[test]
    fn group_rows_follow_section_then_display_order() {
        let pph = groups::find("post_partum_hemorrhage").unwrap();
        let names: Vec<_> = for_group(pph).iter().map(|t| (t.section, t.name)).collect();
        assert_eq!(
            names,
            vec![
                ("Vitals", "BP"),
                ("Vitals", "Heart Rate"),
                ("Vitals", "SpO2"),
                ("Vitals", "Temp"),
                ("Events", "Delivery Time"),
                ("Documentation", "Hemorrhage Stage"),
                ("Bleeding Assessment Summary", "QBL"),
                ("Bleeding Assessment Summary", "Fundal Tone"),
                ("Interventions", "Fundal Massage"),
                ("Interventions", "Uterotonic Given"),
            ]
        );
    }

    #[test]
    fn filter_by_section_and_category() {
        let by_section = find(&TemplateFilter {
            section: Some("Output"),
            ..Default::default()
        });
        let names: Vec<_> = by_section.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Urine", "Emesis"]);

        let interventions = find(&TemplateFilter {
            group: groups::find("Post Partum Hemorrhage"),
            category: Some("Intervention"),
            ..Default::default()
        });
        assert_eq!(interventions.len(), 2);
        assert!(find(&TemplateFilter {
            category: Some("Imaging"),
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn serializes_data_type_lowercase() {
        let json = serde_json::to_value(all()[1]).unwrap();
        assert_eq!(json["data_type"], "numeric");
        assert_eq!(json["unit"], "bpm");
    }
}
