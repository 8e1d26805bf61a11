use crate::model::Class;

const PRESCHOOL_KEYWORDS: [&str; 4] = ["play", "reception", "nursery", "kinder"];

pub const PRESCHOOL_SUBJECTS: [&str; 8] = [
    "Number Work",
    "Letter Work",
    "Phonics",
    "Rhymes",
    "Health Habits",
    "Social Habits",
    "Creative Arts",
    "Writing",
];

pub const PRIMARY_SUBJECTS: [&str; 12] = [
    "English Language",
    "Mathematics",
    "Basic Science",
    "Social Studies",
    "Civic Education",
    "Christian Religious Studies",
    "Cultural and Creative Arts",
    "Computer Studies",
    "Physical and Health Education",
    "Agricultural Science",
    "Verbal Reasoning",
    "Quantitative Reasoning",
];

pub fn is_preschool_name(class_name: &str) -> bool {
    let lower = class_name.to_ascii_lowercase();
    PRESCHOOL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// The class's own subject list, or the preset matching its name.
pub fn subjects_for(class: &Class) -> Vec<String> {
    if !class.subjects.is_empty() {
        return class.subjects.clone();
    }
    let preset: &[&str] = if is_preschool_name(&class.name) {
        &PRESCHOOL_SUBJECTS
    } else {
        &PRIMARY_SUBJECTS
    };
    preset.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, subjects: &[&str]) -> Class {
        Class {
            id: "c1".to_string(),
            name: name.to_string(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            class_teacher_id: None,
        }
    }

    #[test]
    fn explicit_list_wins_over_name() {
        let c = class("Nursery 2", &["Mathematics", "Art"]);
        assert_eq!(subjects_for(&c), vec!["Mathematics", "Art"]);
    }

    #[test]
    fn preschool_keywords_pick_preschool_preset() {
        for name in ["Playgroup", "RECEPTION", "Nursery 1", "Kindergarten B"] {
            let subjects = subjects_for(&class(name, &[]));
            assert_eq!(subjects[0], PRESCHOOL_SUBJECTS[0], "{}", name);
        }
    }

    #[test]
    fn other_names_pick_primary_preset() {
        let subjects = subjects_for(&class("Primary 4", &[]));
        assert_eq!(subjects.len(), PRIMARY_SUBJECTS.len());
        assert_eq!(subjects[1], "Mathematics");
    }
}
