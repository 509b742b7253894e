//! The interface rules applied to a [`ScriptModel`].

use std::collections::BTreeSet;

use super::metadata::ScriptMetadata;
use super::model::{Function, ScriptModel, split_top_level};
use super::lexer::{Token, TokenKind};
use super::{Diagnostic, Location};

/// Output primitives that bypass the result channel.
const UNSANCTIONED_OUTPUT: &[&str] = &[
    "print",
    "builtins.print",
    "pprint",
    "pprint.pprint",
    "pprint.pp",
    "sys.stdout.write",
    "sys.stdout.writelines",
    "sys.stderr.write",
    "sys.stderr.writelines",
    "sys.__stdout__.write",
    "stdout.write",
    "stderr.write",
    "os.write",
];

const RESULT_CHANNEL: &[&str] = &["sierra.respond", "respond"];

const SUPPORTED_TYPES: &[&str] = &["str", "int", "float", "bool", "Path", "pathlib.Path"];

/// Modules that never need declaring.
const IMPLICIT_MODULES: &[&str] = &["sierra", "typing", "typing_extensions", "__future__"];

/// Distribution names whose import name differs.
const IMPORT_ALIASES: &[(&str, &str)] = &[
    ("beautifulsoup4", "bs4"),
    ("dnspython", "dns"),
    ("python_whois", "whois"),
    ("pyyaml", "yaml"),
    ("pillow", "pil"),
    ("scikit_learn", "sklearn"),
    ("python_dateutil", "dateutil"),
    ("opencv_python", "cv2"),
    ("pyjwt", "jwt"),
    ("python_nmap", "nmap"),
    ("pycryptodome", "crypto"),
    ("pyopenssl", "openssl"),
];

/// Top-level standard library modules (lowercase).
const STDLIB: &[&str] = &[
    "__main__", "_thread", "abc", "aifc", "argparse", "array", "ast", "asynchat", "asyncio",
    "asyncore", "atexit", "audioop", "base64", "bdb", "binascii", "bisect", "builtins", "bz2",
    "calendar", "cgi", "cgitb", "chunk", "cmath", "cmd", "code", "codecs", "codeop", "collections",
    "colorsys", "compileall", "concurrent", "configparser", "contextlib", "contextvars", "copy",
    "copyreg", "cprofile", "crypt", "csv", "ctypes", "curses", "dataclasses", "datetime", "dbm",
    "decimal", "difflib", "dis", "doctest", "email", "encodings", "ensurepip", "enum", "errno",
    "faulthandler", "fcntl", "filecmp", "fileinput", "fnmatch", "fractions", "ftplib", "functools",
    "gc", "getopt", "getpass", "gettext", "glob", "graphlib", "grp", "gzip", "hashlib", "heapq",
    "hmac", "html", "http", "idlelib", "imaplib", "imghdr", "imp", "importlib", "inspect", "io",
    "ipaddress", "itertools", "json", "keyword", "lib2to3", "linecache", "locale", "logging",
    "lzma", "mailbox", "mailcap", "marshal", "math", "mimetypes", "mmap", "modulefinder", "msvcrt",
    "multiprocessing", "netrc", "nis", "nntplib", "ntpath", "numbers", "opcode", "operator",
    "optparse", "os", "ossaudiodev", "pathlib", "pdb", "pickle", "pickletools", "pipes", "pkgutil",
    "platform", "plistlib", "poplib", "posix", "posixpath", "pprint", "profile", "pstats", "pty",
    "pwd", "py_compile", "pyclbr", "pydoc", "queue", "quopri", "random", "re", "readline",
    "reprlib", "resource", "rlcompleter", "runpy", "sched", "secrets", "select", "selectors",
    "shelve", "shlex", "shutil", "signal", "site", "smtpd", "smtplib", "sndhdr", "socket",
    "socketserver", "spwd", "sqlite3", "sre_compile", "sre_constants", "sre_parse", "ssl", "stat",
    "statistics", "string", "stringprep", "struct", "subprocess", "sunau", "symtable", "sys",
    "sysconfig", "syslog", "tabnanny", "tarfile", "telnetlib", "tempfile", "termios", "textwrap",
    "threading", "time", "timeit", "tkinter", "token", "tokenize", "tomllib", "trace", "traceback",
    "tracemalloc", "tty", "turtle", "types", "unicodedata", "unittest", "urllib", "uu", "uuid",
    "venv", "warnings", "wave", "weakref", "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib",
    "xml", "xmlrpc", "zipapp", "zipfile", "zipimport", "zlib", "zoneinfo",
];

#[derive(Debug, Default)]
pub(super) struct Findings {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Findings {
    fn error(&mut self, location: Location, message: String) {
        self.errors.push(Diagnostic { location, message });
    }

    fn warning(&mut self, location: Location, message: String) {
        self.warnings.push(Diagnostic { location, message });
    }
}

const START: Location = Location { line: 1, column: 1 };

pub(super) fn check(model: &ScriptModel, metadata: Option<&ScriptMetadata>, out: &mut Findings) {
    check_declaration(model, out);
    let entry = check_entry(model, metadata, out);
    check_helpers(model, entry, out);
    check_output(model, out);
    check_dependencies(model, metadata, out);
    check_registration(model, out);
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `InvokerScript(name=..., description=...)`
fn check_declaration(model: &ScriptModel, out: &mut Findings) {
    let Some(decl) = model.calls.iter().find(|c| c.ends_with("InvokerScript")) else {
        out.warning(START, "No InvokerScript declaration found".to_string());
        return;
    };

    match decl.keyword_str("name").or_else(|| decl.positional_str()) {
        Some(name) if !is_identifier(&name) => out.error(
            decl.location,
            format!("Invalid invoker name '{}': use letters, digits and underscores", name),
        ),
        Some(_) => {}
        None => out.warning(decl.location, "Invoker declaration has no name".to_string()),
    }

    if decl
        .keyword_str("description")
        .is_none_or(|d| d.trim().is_empty())
    {
        out.warning(decl.location, "Missing invoker description".to_string());
    }
}

fn find_entry<'a>(
    model: &'a ScriptModel,
    metadata: Option<&ScriptMetadata>,
    out: &mut Findings,
) -> Option<&'a Function> {
    if let Some(name) = metadata.and_then(|m| m.entry.as_deref()) {
        let found = model.top_level_function(name);
        if found.is_none() {
            out.error(
                START,
                format!("Entry routine '{}' named in metadata was not found", name),
            );
        }
        return found;
    }

    let entries: Vec<&Function> = model
        .functions
        .iter()
        .filter(|f| {
            f.decorators
                .iter()
                .any(|d| d == "entry_point" || d.ends_with(".entry_point"))
        })
        .collect();

    match entries.as_slice() {
        [] => {
            out.error(
                START,
                "No entry routine found: decorate one function with @invoker.entry_point"
                    .to_string(),
            );
            None
        }
        [only] => Some(*only),
        [first, rest @ ..] => {
            for extra in rest {
                out.error(
                    extra.location,
                    format!(
                        "Multiple entry routines: '{}' conflicts with '{}'",
                        extra.name, first.name
                    ),
                );
            }
            Some(*first)
        }
    }
}

fn check_entry<'a>(
    model: &'a ScriptModel,
    metadata: Option<&ScriptMetadata>,
    out: &mut Findings,
) -> Option<&'a Function> {
    let entry = find_entry(model, metadata, out)?;
    let declared = metadata.and_then(|m| m.parameters.as_ref());

    if entry.params.is_empty() {
        out.warning(
            entry.location,
            format!("Entry routine '{}' declares no parameters", entry.name),
        );
    }

    for param in &entry.params {
        let spec = metadata.and_then(|m| m.parameter(&param.name));

        match &param.annotation {
            None => out.error(
                param.location,
                format!(
                    "Parameter '{}' in '{}' missing type annotation",
                    param.name, entry.name
                ),
            ),
            Some(ann) => check_type(&param.name, &ann.type_tokens, param.location, out),
        }

        let description = param
            .annotation
            .as_ref()
            .and_then(|a| a.option.as_ref())
            .and_then(|o| o.description.clone())
            .or_else(|| spec.and_then(|s| s.description.clone()));
        if description.is_none_or(|d| d.trim().is_empty()) {
            out.warning(
                param.location,
                format!("Parameter '{}' in '{}' has no description", param.name, entry.name),
            );
        }

        if param.name.starts_with('_') {
            out.warning(
                param.location,
                format!("Parameter '{}' starts with an underscore", param.name),
            );
        } else if param.name.chars().any(|c| c.is_ascii_alphabetic())
            && param.name == param.name.to_uppercase()
        {
            out.warning(
                param.location,
                format!("Parameter '{}' is all uppercase", param.name),
            );
        }
    }

    let option_count = match declared {
        Some(specs) => {
            for spec in specs {
                if !entry.params.iter().any(|p| p.name == spec.name) {
                    out.error(
                        entry.location,
                        format!(
                            "Option '{}' declared in metadata has no parameter in '{}'",
                            spec.name, entry.name
                        ),
                    );
                }
            }
            specs.len()
        }
        None => entry
            .params
            .iter()
            .filter(|p| p.annotation.as_ref().is_some_and(|a| a.option.is_some()))
            .count(),
    };
    if option_count != entry.params.len() {
        out.error(
            entry.location,
            format!(
                "Entry routine '{}' has {} parameter(s) but declares {} option(s)",
                entry.name,
                entry.params.len(),
                option_count
            ),
        );
    }

    if entry.returns.is_none() {
        out.warning(
            entry.location,
            format!("Entry routine '{}' missing return type annotation", entry.name),
        );
    }

    Some(entry)
}

/// Strip `None` and `Optional[...]`, then judge what is left.
fn check_type(param: &str, tokens: &[Token], location: Location, out: &mut Findings) {
    let mut parts: Vec<&[Token]> = split_top_level(tokens, "|");
    let mut concrete = Vec::new();
    while let Some(part) = parts.pop() {
        let name: String = part
            .iter()
            .take_while(|t| t.kind == TokenKind::Name || t.is_op("."))
            .map(|t| t.text.as_str())
            .collect();
        let is_optional = (name == "Optional" || name == "typing.Optional")
            && part.last().is_some_and(|t| t.is_op("]"));
        if is_optional {
            let open = part.iter().position(|t| t.is_op("[")).unwrap_or(0);
            parts.extend(split_top_level(&part[open + 1..part.len() - 1], "|"));
            continue;
        }
        if part.len() == 1 && part[0].is_name("None") {
            continue;
        }
        concrete.push(part);
    }
    concrete.reverse();

    for part in concrete {
        let tag = match part {
            [single] if single.kind == TokenKind::Str => single.text.clone(),
            _ => super::model::render(part),
        };
        if tag == "Any" || tag == "typing.Any" {
            out.warning(
                location,
                format!("Parameter '{}' uses 'Any' type; use a specific type", param),
            );
        } else if !SUPPORTED_TYPES.contains(&tag.as_str()) {
            out.warning(
                location,
                format!(
                    "Parameter '{}' has unsupported type '{}'; use str, int, float, bool or Path",
                    param, tag
                ),
            );
        }
    }
}

fn check_helpers(model: &ScriptModel, entry: Option<&Function>, out: &mut Findings) {
    for function in &model.functions {
        if entry.is_some_and(|e| e.line == function.line) || function.name == "load" {
            continue;
        }
        for param in function.params.iter().filter(|p| p.annotation.is_none()) {
            out.warning(
                param.location,
                format!(
                    "Parameter '{}' in '{}' missing type annotation",
                    param.name, function.name
                ),
            );
        }
    }
}

fn check_output(model: &ScriptModel, out: &mut Findings) {
    for call in &model.calls {
        if UNSANCTIONED_OUTPUT.contains(&call.path.as_str()) {
            out.error(
                call.location,
                format!(
                    "Direct output via '{}' is not allowed; emit results with sierra.respond",
                    call.path
                ),
            );
        }
    }

    if !model
        .calls
        .iter()
        .any(|c| RESULT_CHANNEL.contains(&c.path.as_str()))
    {
        out.warning(
            START,
            "Script never emits a result through sierra.respond".to_string(),
        );
    }
}

/// Requirement string to the name it is imported under:
/// `Python-Whois>=0.8` becomes `whois`.
pub(super) fn import_name(requirement: &str) -> String {
    let end = requirement
        .find(['<', '>', '=', '!', '~', ';', '[', '@', ' '])
        .unwrap_or(requirement.len());
    let normalized = requirement[..end]
        .trim()
        .to_lowercase()
        .replace(['-', '.'], "_");
    IMPORT_ALIASES
        .iter()
        .find(|(dist, _)| *dist == normalized)
        .map(|(_, module)| module.to_string())
        .unwrap_or(normalized)
}

fn check_dependencies(model: &ScriptModel, metadata: Option<&ScriptMetadata>, out: &mut Findings) {
    let mut declared: Vec<(String, String, Location)> = Vec::new();
    for call in model.calls.iter().filter(|c| c.ends_with("requirement")) {
        for requirement in call.string_args() {
            declared.push((requirement.to_string(), import_name(requirement), call.location));
        }
    }
    if let Some(meta) = metadata {
        for requirement in &meta.requirements {
            declared.push((requirement.clone(), import_name(requirement), START));
        }
    }

    let imported: BTreeSet<String> = model
        .imports
        .iter()
        .map(|i| i.module.to_lowercase())
        .collect();
    let declared_names: BTreeSet<&str> = declared.iter().map(|(_, n, _)| n.as_str()).collect();

    let mut reported = BTreeSet::new();
    for (requirement, name, location) in &declared {
        if !imported.contains(name) && reported.insert(name.clone()) {
            out.warning(
                *location,
                format!("Declared dependency '{}' is never imported", requirement),
            );
        }
    }

    let mut reported = BTreeSet::new();
    for import in &model.imports {
        let module = import.module.to_lowercase();
        if STDLIB.contains(&module.as_str())
            || IMPLICIT_MODULES.contains(&module.as_str())
            || declared_names.contains(module.as_str())
        {
            continue;
        }
        if reported.insert(module) {
            out.warning(
                import.location,
                format!(
                    "Module '{}' is imported but not declared as a requirement",
                    import.module
                ),
            );
        }
    }
}

/// `def load(client): client.load_invoker(invoker)`
fn check_registration(model: &ScriptModel, out: &mut Findings) {
    match model.top_level_function("load") {
        None => out.warning(
            START,
            "No registration hook: define load(client) calling client.load_invoker".to_string(),
        ),
        Some(load) if !model.calls_in(load).any(|c| c.ends_with("load_invoker")) => out.warning(
            load.location,
            "Registration hook 'load' never calls load_invoker".to_string(),
        ),
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_name() {
        assert_eq!(import_name("requests"), "requests");
        assert_eq!(import_name("Requests>=2.31"), "requests");
        assert_eq!(import_name("python-whois==0.8.0"), "whois");
        assert_eq!(import_name("beautifulsoup4"), "bs4");
        assert_eq!(import_name("dnspython[doh]"), "dns");
        assert_eq!(import_name("zope.interface"), "zope_interface");
    }

    #[test]
    fn test_identifier() {
        assert!(is_identifier("whois_lookup"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("whois-lookup"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }
}
