use im::Vector;

pub trait PushImmut<T> {
    fn push(&self, item: T) -> Vector<T>;
}
impl<T: Clone> PushImmut<T> for Vector<T> {
    fn push(&self, item: T) -> Vector<T> {
        let mut result = self.clone();
        result.push_back(item);
        result
    }
}

pub trait ReplaceImmut<T> {
    fn replace_idx(&self, idx: usize, item: T) -> Vector<T>;
}
impl<T: Clone> ReplaceImmut<T> for Vector<T> {
    fn replace_idx(&self, idx: usize, item: T) -> Vector<T> {
        self.update(idx, item)
    }
}

/// Trims a form field. Blank input becomes the empty string the stored records use for
/// "absent".
pub fn clean_field(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use im::vector;

    use super::{clean_field, PushImmut, ReplaceImmut};

    #[test]
    fn push_leaves_original_untouched() {
        let original = vector![1, 2];
        let pushed = original.push(3);
        assert_eq!(original, vector![1, 2]);
        assert_eq!(pushed, vector![1, 2, 3]);
    }

    #[test]
    fn replace_leaves_original_untouched() {
        let original = vector!["a", "b", "c"];
        let replaced = original.replace_idx(1, "z");
        assert_eq!(original, vector!["a", "b", "c"]);
        assert_eq!(replaced, vector!["a", "z", "c"]);
    }

    #[test]
    fn clean_field_trims_and_defaults() {
        assert_eq!(clean_field(Some("  notes ")), "notes");
        assert_eq!(clean_field(Some("   ")), "");
        assert_eq!(clean_field(None), "");
    }
}
