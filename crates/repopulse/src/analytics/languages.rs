//! Display colors for programming languages.

/// Color used for languages missing from [`LANGUAGE_COLORS`].
pub const DEFAULT_LANGUAGE_COLOR: &str = "#858585";

/// Linguist colors for common languages, keyed by GitHub's language name.
pub const LANGUAGE_COLORS: &[(&str, &str)] = &[
    ("C", "#555555"),
    ("C#", "#178600"),
    ("C++", "#f34b7d"),
    ("CSS", "#563d7c"),
    ("Clojure", "#db5855"),
    ("CoffeeScript", "#244776"),
    ("Dart", "#00b4ab"),
    ("Dockerfile", "#384d54"),
    ("Elixir", "#6e4a7e"),
    ("Elm", "#60b5cc"),
    ("Erlang", "#b83998"),
    ("Go", "#00add8"),
    ("Groovy", "#4298b8"),
    ("HTML", "#e34c26"),
    ("Haskell", "#5e5086"),
    ("Java", "#b07219"),
    ("JavaScript", "#f1e05a"),
    ("Julia", "#a270ba"),
    ("Jupyter Notebook", "#da5b0b"),
    ("Kotlin", "#a97bff"),
    ("Lua", "#000080"),
    ("Makefile", "#427819"),
    ("Nix", "#7e7eff"),
    ("Objective-C", "#438eff"),
    ("OCaml", "#ef7a08"),
    ("PHP", "#4f5d95"),
    ("Perl", "#0298c3"),
    ("PowerShell", "#012456"),
    ("Python", "#3572a5"),
    ("R", "#198ce7"),
    ("Ruby", "#701516"),
    ("Rust", "#dea584"),
    ("SCSS", "#c6538c"),
    ("Scala", "#c22d40"),
    ("Shell", "#89e051"),
    ("Svelte", "#ff3e00"),
    ("Swift", "#f05138"),
    ("TypeScript", "#3178c6"),
    ("Vue", "#41b883"),
    ("Zig", "#ec915c"),
];

/// Display color for `language`, falling back to [`DEFAULT_LANGUAGE_COLOR`].
pub fn language_color(language: &str) -> &'static str {
    LANGUAGE_COLORS
        .iter()
        .find(|(name, _)| *name == language)
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_LANGUAGE_COLOR)
}
