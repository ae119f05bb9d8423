//! URL slug generation.

/// Convert free text into a URL slug.
///
/// Lower-cases ASCII letters and digits, folds common accented Latin letters
/// to their base letter, and collapses every other run of characters into a
/// single `-`. Leading and trailing dashes are removed.
///
/// ```
/// use nature_marketplace_core::slugify;
///
/// assert_eq!(slugify("Árbol de Ceiba: Selva Lacandona"), "arbol-de-ceiba-selva-lacandona");
/// assert_eq!(slugify("CB-001 Ceiba"), "cb-001-ceiba");
/// ```
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        match fold_char(c) {
            Some(folded) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(folded);
            }
            None => pending_dash = true,
        }
    }

    slug
}

const fn fold_char(c: char) -> Option<char> {
    match c {
        'a'..='z' | '0'..='9' => Some(c),
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => Some('a'),
        'é' | 'è' | 'ê' | 'ë' => Some('e'),
        'í' | 'ì' | 'î' | 'ï' => Some('i'),
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => Some('o'),
        'ú' | 'ù' | 'û' | 'ü' => Some('u'),
        'ñ' => Some('n'),
        'ç' => Some('c'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_separators() {
        assert_eq!(slugify("  Bosque   Nuboso -- Monteverde  "), "bosque-nuboso-monteverde");
    }

    #[test]
    fn test_folds_accents() {
        assert_eq!(slugify("Laguna Ñandú"), "laguna-nandu");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }
}
