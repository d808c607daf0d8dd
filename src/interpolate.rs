use std::collections::HashMap;
use std::env;

use crate::tokenizer::{classify_word, Token, Word};

/// Where `$NAME` / `${NAME}` references are looked up.
///
/// `Vars` mode resolves from the supplied map only and never reads the
/// process environment. `Environment` mode reads the process environment.
/// In both modes an unknown name substitutes the empty string; resolution
/// never fails.
#[derive(Debug, Clone, Copy)]
pub enum Resolver<'a> {
    Environment,
    Vars(&'a HashMap<String, String>),
}

impl Resolver<'_> {
    pub fn lookup(&self, name: &str) -> String {
        match self {
            Resolver::Vars(vars) => vars.get(name).cloned().unwrap_or_default(),
            Resolver::Environment => env::var(name).unwrap_or_default(),
        }
    }
}

/// Collapse each word's fragments into a single token, substituting
/// variable references along the way.
///
/// Words that consist only of variable references and resolve to nothing
/// disappear, matching how a shell drops an unquoted empty expansion. A
/// quoted empty word survives because the tokenizer retained its quotes.
pub fn resolve(words: Vec<Word>, resolver: Resolver) -> Vec<Token> {
    let mut resolved = Vec::with_capacity(words.len());
    for word in words {
        // The tokenizer already classified pure-literal flag words.
        if let [Token::Flag(_)] = word.as_slice() {
            resolved.extend(word);
            continue;
        }

        let mut joined = String::new();
        let mut had_literal = false;
        for fragment in word {
            match fragment {
                Token::Value(text) | Token::Flag(text) => {
                    had_literal = true;
                    joined.push_str(&text);
                }
                Token::Variable(name) => joined.push_str(&resolver.lookup(name.as_str())),
            }
        }
        if joined.is_empty() && !had_literal {
            continue;
        }
        // A word assembled from variables can still turn out to be an
        // option, e.g. FLAG=-L.
        resolved.extend(classify_word(vec![Token::Value(joined)]));
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn map_mode_substitutes_from_map() {
        let words = tokenize("curl -H \"X: $T\" https://h.test").unwrap();
        let map = vars(&[("T", "map_val")]);
        let tokens = resolve(words, Resolver::Vars(&map));
        assert!(tokens.contains(&Token::Value("\"X: map_val\"".into())));
    }

    #[test]
    fn map_mode_ignores_environment() {
        // Each test uses a distinct variable name; tests run in parallel.
        env::set_var("RURL_TEST_ISOLATION", "env_val");
        let words = tokenize("$RURL_TEST_ISOLATION").unwrap();
        let map = vars(&[("RURL_TEST_ISOLATION", "map_val")]);
        let tokens = resolve(words, Resolver::Vars(&map));
        assert_eq!(tokens, vec![Token::Value("map_val".into())]);
    }

    #[test]
    fn environment_mode_reads_environment() {
        env::set_var("RURL_TEST_ENV_MODE", "from_env");
        let words = tokenize("${RURL_TEST_ENV_MODE}").unwrap();
        let tokens = resolve(words, Resolver::Environment);
        assert_eq!(tokens, vec![Token::Value("from_env".into())]);
    }

    #[test]
    fn unknown_names_resolve_to_empty() {
        let words = tokenize("a${RURL_TEST_DEFINITELY_UNSET}b").unwrap();
        let tokens = resolve(words, Resolver::Vars(&HashMap::new()));
        assert_eq!(tokens, vec![Token::Value("ab".into())]);
    }

    #[test]
    fn adjacent_substitutions_reconstitute_one_word() {
        let words = tokenize("$A$B").unwrap();
        let map = vars(&[("A", "left"), ("B", "right")]);
        let tokens = resolve(words, Resolver::Vars(&map));
        assert_eq!(tokens, vec![Token::Value("leftright".into())]);
    }

    #[test]
    fn empty_unquoted_expansion_drops_the_word() {
        let words = tokenize("curl $EMPTY_WORD https://h.test").unwrap();
        let tokens = resolve(words, Resolver::Vars(&HashMap::new()));
        assert_eq!(
            tokens,
            vec![
                Token::Value("curl".into()),
                Token::Value("https://h.test".into())
            ]
        );
    }

    #[test]
    fn quoted_empty_expansion_survives() {
        let words = tokenize("\"$EMPTY_WORD\"").unwrap();
        let tokens = resolve(words, Resolver::Vars(&HashMap::new()));
        assert_eq!(tokens, vec![Token::Value("\"\"".into())]);
    }

    #[test]
    fn variable_resolving_to_flag_is_classified() {
        let words = tokenize("$FOLLOW").unwrap();
        let map = vars(&[("FOLLOW", "-L")]);
        let tokens = resolve(words, Resolver::Vars(&map));
        assert_eq!(tokens, vec![Token::Flag("-L".into())]);
    }

    #[test]
    fn single_quoted_text_never_resolves() {
        env::set_var("RURL_TEST_OPAQUE", "visible");
        let words = tokenize("'$RURL_TEST_OPAQUE'").unwrap();
        let tokens = resolve(words, Resolver::Environment);
        assert_eq!(tokens, vec![Token::Value("'$RURL_TEST_OPAQUE'".into())]);
    }
}
