//! Structural model of an invoker script, reconstructed from its tokens.

use std::ops::Range;

use super::Location;
use super::lexer::{LogicalLine, Token, TokenKind};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

/// `SierraOption(...)` attached to a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    pub location: Location,
    pub description: Option<String>,
    pub required: bool,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Tokens of the semantic type (`str | None` in `Param[str | None, ...]`).
    pub type_tokens: Vec<Token>,
    pub option: Option<OptionDecl>,
}

impl Annotation {
    pub fn type_tag(&self) -> String {
        render(&self.type_tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub location: Location,
    pub annotation: Option<Annotation>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub location: Location,
    pub indent: usize,
    /// Dotted decorator names, e.g. `invoker.entry_point`.
    pub decorators: Vec<String>,
    pub params: Vec<Parameter>,
    pub returns: Option<String>,
    /// Index of the `def` line.
    pub line: usize,
    /// Logical lines making up the body.
    pub body: Range<usize>,
}

impl Function {
    pub fn is_top_level(&self) -> bool {
        self.indent == 0
    }

    pub fn contains_line(&self, index: usize) -> bool {
        index == self.line || self.body.contains(&index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Top-level module name (`os` for `import os.path`).
    pub module: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Dotted callee, e.g. `sys.stdout.write`.
    pub path: String,
    pub location: Location,
    pub line: usize,
    /// Tokens between the parentheses.
    pub args: Vec<Token>,
}

impl CallSite {
    pub fn ends_with(&self, segment: &str) -> bool {
        self.path == segment || self.path.ends_with(&format!(".{}", segment))
    }

    pub fn string_args(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter(|t| t.kind == TokenKind::Str)
            .map(|t| t.text.as_str())
            .collect()
    }

    /// String value of keyword argument `key`, adjacent literals joined.
    pub fn keyword_str(&self, key: &str) -> Option<String> {
        split_top_level(&self.args, ",")
            .into_iter()
            .find_map(|arg| keyword_value(arg, key))
            .and_then(concat_strings)
    }

    /// First positional string argument.
    pub fn positional_str(&self) -> Option<String> {
        split_top_level(&self.args, ",")
            .into_iter()
            .next()
            .filter(|arg| !arg.iter().any(|t| t.is_op("=")))
            .and_then(concat_strings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptModel {
    pub functions: Vec<Function>,
    pub imports: Vec<Import>,
    pub calls: Vec<CallSite>,
}

impl ScriptModel {
    pub fn build(lines: &[LogicalLine]) -> Self {
        let mut model = ScriptModel::default();
        let mut decorators = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let tokens = &line.tokens;
            if tokens.first().is_some_and(|t| t.is_op("@")) {
                decorators.push(dotted_name(&tokens[1..]).0);
            } else if let Some(function) =
                parse_def(lines, index, std::mem::take(&mut decorators))
            {
                model.functions.push(function);
            } else {
                decorators.clear();
            }

            for statement in split_top_level(tokens, ";") {
                model.imports.extend(parse_import(statement));
            }
            model.calls.extend(find_calls(tokens, index));
        }

        model
    }

    pub fn top_level_function(&self, name: &str) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.is_top_level() && f.name == name)
    }

    pub fn calls_in<'a>(&'a self, function: &'a Function) -> impl Iterator<Item = &'a CallSite> {
        self.calls.iter().filter(|c| function.contains_line(c.line))
    }
}

/// Render tokens back to compact source text (`dict[str, int]`, `str | None`).
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            let word = |t: &Token| t.kind != TokenKind::Op;
            if p.text == "," || p.is_op("|") || token.is_op("|") || (word(p) && word(token)) {
                out.push(' ');
            }
        }
        if token.kind == TokenKind::Str {
            out.push('"');
            out.push_str(&token.text);
            out.push('"');
        } else {
            out.push_str(&token.text);
        }
        prev = Some(token);
    }
    out
}

/// Split on `separator` at bracket depth zero, dropping empty pieces.
pub fn split_top_level<'a>(tokens: &'a [Token], separator: &str) -> Vec<&'a [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, t) in tokens.iter().enumerate() {
        if t.kind != TokenKind::Op {
            continue;
        }
        match t.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            s if s == separator && depth == 0 => {
                if i > start {
                    parts.push(&tokens[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < tokens.len() {
        parts.push(&tokens[start..]);
    }
    parts
}

/// Index of the bracket closing the one at `open`.
fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        if t.kind != TokenKind::Op {
            continue;
        }
        match t.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Read `a.b.c` from the start of `tokens`; returns the name and the number
/// of tokens consumed.
fn dotted_name(tokens: &[Token]) -> (String, usize) {
    let mut name = String::new();
    let mut used = 0;
    while let Some(t) = tokens.get(used) {
        if t.kind != TokenKind::Name {
            break;
        }
        name.push_str(&t.text);
        used += 1;
        if tokens.get(used).is_some_and(|t| t.is_op("."))
            && tokens.get(used + 1).is_some_and(|t| t.kind == TokenKind::Name)
        {
            name.push('.');
            used += 1;
        } else {
            break;
        }
    }
    (name, used)
}

fn concat_strings(tokens: &[Token]) -> Option<String> {
    let strings: Vec<&str> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Str)
        .map(|t| t.text.as_str())
        .collect();
    (!strings.is_empty()).then(|| strings.concat())
}

fn keyword_value<'a>(arg: &'a [Token], key: &str) -> Option<&'a [Token]> {
    match arg {
        [k, eq, rest @ ..] if k.is_name(key) && eq.is_op("=") => Some(rest),
        _ => None,
    }
}

fn parse_def(lines: &[LogicalLine], index: usize, decorators: Vec<String>) -> Option<Function> {
    let line = &lines[index];
    let tokens = &line.tokens;
    let def_at = if tokens.first()?.is_name("async") { 1 } else { 0 };
    if !tokens.get(def_at)?.is_name("def") {
        return None;
    }

    let name_token = tokens.get(def_at + 1)?;
    let open = def_at + 2;
    if name_token.kind != TokenKind::Name || !tokens.get(open)?.is_op("(") {
        return None;
    }
    let close = matching_close(tokens, open)?;

    let returns = if tokens.get(close + 1).is_some_and(|t| t.is_op("->")) {
        let ann: Vec<Token> = tokens[close + 2..]
            .iter()
            .take_while(|t| !t.is_op(":"))
            .cloned()
            .collect();
        Some(render(&ann))
    } else {
        None
    };

    let body_end = lines[index + 1..]
        .iter()
        .position(|l| l.indent <= line.indent)
        .map(|p| index + 1 + p)
        .unwrap_or(lines.len());

    Some(Function {
        name: name_token.text.clone(),
        location: name_token.location,
        indent: line.indent,
        decorators,
        params: parse_params(&tokens[open + 1..close]),
        returns,
        line: index,
        body: index + 1..body_end,
    })
}

fn parse_params(tokens: &[Token]) -> Vec<Parameter> {
    let mut params = Vec::new();
    for chunk in split_top_level(tokens, ",") {
        let variadic = chunk[0].is_op("*") || chunk[0].is_op("**");
        let rest = if variadic { &chunk[1..] } else { chunk };
        let Some(name) = rest.first().filter(|t| t.kind == TokenKind::Name) else {
            continue; // bare `*` or `/`
        };
        if name.text == "self" || name.text == "cls" {
            continue;
        }

        let annotation = match rest.get(1) {
            Some(t) if t.is_op(":") => {
                let ann = split_top_level(&rest[2..], "=")
                    .into_iter()
                    .next()
                    .unwrap_or(&[]);
                (!ann.is_empty()).then(|| parse_annotation(ann))
            }
            _ => None,
        };

        params.push(Parameter {
            name: name.text.clone(),
            location: name.location,
            annotation,
            variadic,
        });
    }
    params
}

/// `Param[T, SierraOption(...)]` and `Annotated[T, ...]` carry a type plus
/// metadata; anything else is a bare type.
fn parse_annotation(tokens: &[Token]) -> Annotation {
    let (wrapper, used) = dotted_name(tokens);
    let last = wrapper.rsplit('.').next().unwrap_or_default();
    let wrapped = matches!(last, "Param" | "Annotated")
        && tokens.get(used).is_some_and(|t| t.is_op("["))
        && matching_close(tokens, used) == Some(tokens.len() - 1);

    if !wrapped {
        return Annotation {
            type_tokens: tokens.to_vec(),
            option: None,
        };
    }

    let inner = &tokens[used + 1..tokens.len() - 1];
    let mut parts = split_top_level(inner, ",").into_iter();
    let type_tokens = parts.next().map(<[Token]>::to_vec).unwrap_or_default();
    let option = parts.find_map(parse_option);

    Annotation {
        type_tokens,
        option,
    }
}

fn parse_option(tokens: &[Token]) -> Option<OptionDecl> {
    let (name, used) = dotted_name(tokens);
    if name.rsplit('.').next() != Some("SierraOption") || !tokens.get(used)?.is_op("(") {
        return None;
    }
    let close = matching_close(tokens, used)?;
    let args = split_top_level(&tokens[used + 1..close], ",");

    let value = |key: &str| args.iter().find_map(|a| keyword_value(a, key));
    let truthy = |v: Option<&[Token]>| {
        v.and_then(|v| v.first()).is_some_and(|t| match t.kind {
            TokenKind::Name => t.text == "True",
            TokenKind::Str => matches!(t.text.to_uppercase().as_str(), "MANDATORY" | "TRUE"),
            _ => false,
        })
    };

    Some(OptionDecl {
        location: tokens[0].location,
        description: value("description").and_then(concat_strings),
        required: truthy(value("mandatory")) || truthy(value("required")),
        primary: truthy(value("primary")),
    })
}

fn parse_import(statement: &[Token]) -> Vec<Import> {
    match statement.first() {
        Some(t) if t.is_name("import") => split_top_level(&statement[1..], ",")
            .into_iter()
            .filter_map(|part| {
                let first = part.first().filter(|t| t.kind == TokenKind::Name)?;
                Some(Import {
                    module: first.text.clone(),
                    location: first.location,
                })
            })
            .collect(),
        Some(t) if t.is_name("from") => match statement.get(1) {
            Some(m) if m.kind == TokenKind::Name && m.text != "__future__" => vec![Import {
                module: m.text.clone(),
                location: m.location,
            }],
            // relative import
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn find_calls(tokens: &[Token], line: usize) -> Vec<CallSite> {
    let mut calls = Vec::new();
    for start in 0..tokens.len() {
        let token = &tokens[start];
        if token.kind != TokenKind::Name || KEYWORDS.contains(&token.text.as_str()) {
            continue;
        }
        if start > 0 {
            let prev = &tokens[start - 1];
            if prev.is_op(".") || prev.is_name("def") || prev.is_name("class") {
                continue;
            }
        }

        let (path, used) = dotted_name(&tokens[start..]);
        let open = start + used;
        if !tokens.get(open).is_some_and(|t| t.is_op("(")) {
            continue;
        }
        let close = matching_close(tokens, open).unwrap_or(tokens.len());
        calls.push(CallSite {
            path,
            location: token.location,
            line,
            args: tokens[open + 1..close].to_vec(),
        });
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::lexer::tokenize;

    fn model(src: &str) -> ScriptModel {
        ScriptModel::build(&tokenize(src).unwrap())
    }

    const SCRIPT: &str = r#"
import os, re
import requests.adapters as ra
from bs4 import BeautifulSoup
from . import helpers
import sierra

invoker = sierra.InvokerScript(name="demo", description="Demo " "tool")
invoker.requirement(["requests", "beautifulsoup4"])

@invoker.dependancy
def helper(x: int, y) -> str:
    return str(x)

@invoker.entry_point
def run(
    target: sierra.Param[
        str | None,
        sierra.SierraOption(description="Target host", mandatory="MANDATORY", primary=True)
    ],
    *,
    count: int = 3,
) -> None:
    sierra.respond(helper(count))

def load(client):
    client.load_invoker(invoker)
"#;

    #[test]
    fn test_functions_and_decorators() {
        let m = model(SCRIPT);
        let names: Vec<_> = m.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["helper", "run", "load"]);

        let run = &m.functions[1];
        assert_eq!(run.decorators, vec!["invoker.entry_point"]);
        assert_eq!(run.returns.as_deref(), Some("None"));
        assert_eq!(run.params.len(), 2);

        let helper = &m.functions[0];
        assert_eq!(helper.decorators, vec!["invoker.dependancy"]);
        assert!(helper.params[1].annotation.is_none());

        let load = m.top_level_function("load").unwrap();
        assert!(load.returns.is_none());
        assert!(m.calls_in(load).any(|c| c.ends_with("load_invoker")));
    }

    #[test]
    fn test_param_annotation_with_option() {
        let m = model(SCRIPT);
        let target = &m.functions[1].params[0];
        let ann = target.annotation.as_ref().unwrap();
        assert_eq!(ann.type_tag(), "str | None");

        let option = ann.option.as_ref().unwrap();
        assert_eq!(option.description.as_deref(), Some("Target host"));
        assert!(option.required);
        assert!(option.primary);

        let count = &m.functions[1].params[1];
        let ann = count.annotation.as_ref().unwrap();
        assert_eq!(ann.type_tag(), "int");
        assert!(ann.option.is_none());
    }

    #[test]
    fn test_imports_skip_relative() {
        let m = model(SCRIPT);
        let modules: Vec<_> = m.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["os", "re", "requests", "bs4", "sierra"]);
    }

    #[test]
    fn test_calls() {
        let m = model(SCRIPT);
        let decl = m
            .calls
            .iter()
            .find(|c| c.ends_with("InvokerScript"))
            .unwrap();
        assert_eq!(decl.keyword_str("name").as_deref(), Some("demo"));
        assert_eq!(decl.keyword_str("description").as_deref(), Some("Demo tool"));

        let req = m.calls.iter().find(|c| c.ends_with("requirement")).unwrap();
        assert_eq!(req.string_args(), vec!["requests", "beautifulsoup4"]);

        let paths: Vec<_> = m.calls.iter().map(|c| c.path.as_str()).collect();
        assert!(paths.contains(&"sierra.respond"));
        assert!(paths.contains(&"helper"));
        assert!(paths.contains(&"str"));
        assert!(!paths.contains(&"run"));
    }

    #[test]
    fn test_body_range_ends_at_dedent() {
        let m = model("def a():\n    x = 1\n    if x:\n        print(x)\ny = 2\n");
        let a = &m.functions[0];
        assert_eq!(a.body, 1..4);
        assert!(m.calls_in(a).any(|c| c.path == "print"));
    }

    #[test]
    fn test_render() {
        let tokens = &tokenize("dict[str, typing.Any]\n").unwrap()[0].tokens;
        assert_eq!(render(tokens), "dict[str, typing.Any]");
    }
}
