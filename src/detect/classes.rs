//! Class tables.
//!
//! Detectors speak 80-class COCO ids. The investigation table is the subset
//! exposed to configuration and the command line.

use std::collections::BTreeSet;

use crate::error::ConfigError;

pub const COCO_CLASS_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Classes a user may target.
pub const INVESTIGATION_CLASSES: [(u32, &str); 6] = [
    (0, "person"),
    (1, "bicycle"),
    (2, "car"),
    (3, "motorcycle"),
    (5, "bus"),
    (7, "truck"),
];

/// Selected when nothing is configured.
pub const DEFAULT_TARGET_CLASSES: [&str; 5] = ["person", "bicycle", "car", "truck", "bus"];

pub fn coco_class_name(class_id: u32) -> Option<&'static str> {
    COCO_CLASS_NAMES.get(class_id as usize).copied()
}

pub fn class_id_for_name(name: &str) -> Option<u32> {
    let name = name.trim();
    INVESTIGATION_CLASSES
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}

/// Resolve class names into ids, rejecting names outside the table.
pub fn resolve_class_names<S: AsRef<str>>(names: &[S]) -> Result<BTreeSet<u32>, ConfigError> {
    names
        .iter()
        .map(|name| {
            class_id_for_name(name.as_ref())
                .ok_or_else(|| ConfigError::UnknownClass(name.as_ref().trim().to_string()))
        })
        .collect()
}

/// Names of the given ids, in id order, joined for display.
pub fn describe_classes(ids: &BTreeSet<u32>) -> String {
    ids.iter()
        .map(|id| {
            coco_class_name(*id)
                .map(str::to_string)
                .unwrap_or_else(|| format!("class_{}", id))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn investigation_table_agrees_with_coco() {
        for (id, name) in INVESTIGATION_CLASSES {
            assert_eq!(coco_class_name(id), Some(name));
        }
    }

    #[test]
    fn resolves_names_case_insensitively() {
        let ids = resolve_class_names(&["Person", " truck "]).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![0, 7]);
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            resolve_class_names(&["person", "giraffe"]),
            Err(ConfigError::UnknownClass("giraffe".to_string()))
        );
    }

    #[test]
    fn describes_in_id_order() {
        let ids: BTreeSet<u32> = [7, 0, 2].into_iter().collect();
        assert_eq!(describe_classes(&ids), "person, car, truck");
    }
}
