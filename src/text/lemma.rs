// Base-form reduction for English tokens.
//
// Noun-oriented suffix rules in the style of WordNet's morphy, without the
// dictionary lookup: irregular plurals come from a small exception table,
// regular plurals lose their inflection, everything else passes through.

const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("men", "man"),
    ("mice", "mouse"),
    ("teeth", "tooth"),
    ("women", "woman"),
];

/// Suffix rewrites, longest first. Each applies only if the remaining stem
/// keeps at least `MIN_SUFFIX_STEM` characters.
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("ies", "y"),
    ("xes", "x"),
    ("zes", "z"),
];

const MIN_SUFFIX_STEM: usize = 2;
const MIN_STEM: usize = 3;

/// Reduce a lowercase token to its base form.
pub fn lemmatize(token: &str) -> String {
    if let Some((_, base)) = IRREGULAR.iter().find(|(form, _)| *form == token) {
        return (*base).to_string();
    }

    for (suffix, replacement) in SUFFIX_RULES {
        if let Some(stem) = token.strip_suffix(suffix) {
            if stem.chars().count() >= MIN_SUFFIX_STEM {
                return format!("{stem}{replacement}");
            }
        }
    }

    // Plain plural "-s", but not "-ss" (class), "-us" (virus), "-is" (analysis)
    if let Some(stem) = token.strip_suffix('s') {
        let protected = stem.ends_with('s') || stem.ends_with('u') || stem.ends_with('i');
        if !protected && stem.chars().count() >= MIN_STEM {
            return stem.to_string();
        }
    }

    token.to_string()
}
