use crate::candidate::{Symbol, SymbolKind};
use crate::error::GradeError;
use regex::Regex;
use std::sync::OnceLock;

/// Names the problem suggests for its entry point, strongest first.
#[derive(Debug, Clone, Default)]
pub struct EntryHints {
    pub explicit: Option<String>,
    pub starter_code: Option<String>,
}

fn def_line() -> &'static Regex {
    static DEF_LINE: OnceLock<Regex> = OnceLock::new();
    DEF_LINE.get_or_init(|| {
        Regex::new(r"(?m)^\s*def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("static pattern")
    })
}

/// Function names declared by `def` lines in starter code, in order.
pub fn starter_function_names(starter_code: &str) -> Vec<String> {
    def_line()
        .captures_iter(starter_code)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .collect()
}

/// Picks the callable to grade. First match wins:
/// explicit name, starter code `def`s, fallback names, then the first public
/// user callable in definition order.
pub fn resolve_entry_point(
    hints: &EntryHints,
    fallbacks: &[String],
    symbols: &[Symbol],
) -> Result<String, GradeError> {
    let callable = |name: &str| {
        symbols
            .iter()
            .any(|symbol| symbol.name == name && symbol.is_callable())
    };

    if let Some(name) = &hints.explicit {
        let user_defined = symbols
            .iter()
            .any(|symbol| &symbol.name == name && symbol.kind == SymbolKind::Function);
        if user_defined {
            return Ok(name.clone());
        }
    }

    if let Some(starter) = &hints.starter_code {
        if let Some(name) = starter_function_names(starter)
            .into_iter()
            .find(|name| callable(name))
        {
            return Ok(name);
        }
    }

    if let Some(name) = fallbacks.iter().find(|name| callable(name)) {
        return Ok(name.clone());
    }

    symbols
        .iter()
        .find(|symbol| {
            symbol.kind == SymbolKind::Function
                && !symbol.name.starts_with('_')
                && !symbol.shadows_builtin
        })
        .map(|symbol| symbol.name.clone())
        .ok_or(GradeError::EntryPointNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind,
            shadows_builtin: false,
        }
    }

    fn function(name: &str) -> Symbol {
        symbol(name, SymbolKind::Function)
    }

    fn value(name: &str) -> Symbol {
        symbol(name, SymbolKind::Value)
    }

    fn fallbacks() -> Vec<String> {
        vec!["solve".to_string(), "main".to_string()]
    }

    #[test]
    fn starter_code_names_are_found_in_order() {
        let starter = "import math\n\ndef two_sum(nums, target):\n    pass\n  def  helper (x):\n";
        assert_eq!(starter_function_names(starter), ["two_sum", "helper"]);
    }

    #[test]
    fn starter_hint_beats_fallbacks() {
        let hints = EntryHints {
            starter_code: Some("def two_sum(nums, target):\n    pass\n".to_string()),
            ..EntryHints::default()
        };
        let symbols = [function("solve"), function("two_sum")];
        assert_eq!(resolve_entry_point(&hints, &fallbacks(), &symbols).unwrap(), "two_sum");
    }

    #[test]
    fn missing_starter_name_falls_through_to_fallbacks() {
        let hints = EntryHints {
            starter_code: Some("def expected_name(x):\n".to_string()),
            ..EntryHints::default()
        };
        let symbols = [function("helper"), function("main"), function("solve")];
        assert_eq!(resolve_entry_point(&hints, &fallbacks(), &symbols).unwrap(), "solve");
    }

    #[test]
    fn last_resort_skips_private_and_non_callables() {
        let symbols = [value("data"), function("_private"), function("compute")];
        assert_eq!(
            resolve_entry_point(&EntryHints::default(), &fallbacks(), &symbols).unwrap(),
            "compute"
        );
    }

    #[test]
    fn natives_and_builtin_names_are_not_picked_as_last_resort() {
        let shadowing = Symbol {
            shadows_builtin: true,
            ..function("sum")
        };
        let symbols = [symbol("sqrt", SymbolKind::Native), shadowing];
        let err = resolve_entry_point(&EntryHints::default(), &fallbacks(), &symbols).unwrap_err();
        assert_eq!(err.to_string(), "Could not detect function to test");
    }

    #[test]
    fn explicit_name_wins_when_defined() {
        let hints = EntryHints {
            explicit: Some("grade_me".to_string()),
            starter_code: Some("def solve():\n".to_string()),
        };
        let symbols = [function("solve"), function("grade_me")];
        assert_eq!(resolve_entry_point(&hints, &fallbacks(), &symbols).unwrap(), "grade_me");
    }
}
