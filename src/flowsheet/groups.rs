use serde::Serialize;

/// A predefined flowsheet group and the sections it shows, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowsheetGroup {
    pub id: &'static str,
    pub name: &'static str,
    pub sections: &'static [&'static str],
}

static GROUPS: &[FlowsheetGroup] = &[
    FlowsheetGroup {
        id: "pastoral_services",
        name: "Pastoral Services",
        sections: &[
            "Reason For Visit",
            "Religious Affiliation",
            "Visit Information",
            "Sacraments",
            "Spiritual/Cultural Care Plan",
            "Coping (Adult) Care Plan",
            "Coping (Pediatric) Care Plan",
            "Coping (Obstetric) Care Plan",
        ],
    },
    FlowsheetGroup {
        id: "post_partum_hemorrhage",
        name: "Post Partum Hemorrhage",
        sections: &[
            "Vitals",
            "Events",
            "Documentation",
            "Bleeding Assessment Summary",
            "Interventions",
        ],
    },
    FlowsheetGroup {
        id: "intake_output",
        name: "Intake/Output",
        sections: &["Intake", "Output", "Balance"],
    },
    FlowsheetGroup {
        id: "nursing_assessment",
        name: "Nursing Assessment",
        sections: &[
            "Neurological",
            "Cardiovascular",
            "Respiratory",
            "Gastrointestinal",
            "Genitourinary",
            "Musculoskeletal",
            "Skin",
            "Psychosocial",
        ],
    },
];

pub fn all() -> &'static [FlowsheetGroup] {
    GROUPS
}

/// Look a group up by id (`intake_output`) or display name (`Intake/Output`).
pub fn find(key: &str) -> Option<&'static FlowsheetGroup> {
    GROUPS.iter().find(|g| g.id == key || g.name == key)
}
