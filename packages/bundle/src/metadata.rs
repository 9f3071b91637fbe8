use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use stylescope_common::Diagnostics;
use stylescope_parser::ast::{Span, Stylesheet};

/// Name of the class every stylesheet defines implicitly
pub const ROOT_CLASS: &str = "root";

/// Discriminant of a [`Symbol`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Element,
    Var,
    Keyframes,
    Import,
}

/// Entry of a file's symbol table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Symbol {
    Class(ClassSymbol),
    Element(ElementSymbol),
    Var(VarSymbol),
    Keyframes(KeyframesSymbol),
    Import(ImportSymbol),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSymbol {
    pub name: String,
    /// Local name of the extended symbol (`-st-extends`)
    pub extends: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSymbol {
    pub name: String,
    pub extends: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarSymbol {
    pub name: String,
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyframesSymbol {
    pub name: String,
    pub span: Span,
}

/// Which export of the imported file a local name is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportedName {
    Default,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSymbol {
    /// Local binding name
    pub name: String,
    pub imported: ImportedName,
    /// Index into [`Metadata::imports`]
    pub import: usize,
}

impl Symbol {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Symbol::Class(_) => SymbolKind::Class,
            Symbol::Element(_) => SymbolKind::Element,
            Symbol::Var(_) => SymbolKind::Var,
            Symbol::Keyframes(_) => SymbolKind::Keyframes,
            Symbol::Import(_) => SymbolKind::Import,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Class(s) => &s.name,
            Symbol::Element(s) => &s.name,
            Symbol::Var(s) => &s.name,
            Symbol::Keyframes(s) => &s.name,
            Symbol::Import(s) => &s.name,
        }
    }

    /// `-st-extends` target of a class or element
    pub fn extends(&self) -> Option<&str> {
        match self {
            Symbol::Class(s) => s.extends.as_deref(),
            Symbol::Element(s) => s.extends.as_deref(),
            _ => None,
        }
    }
}

/// One `:import` block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Imported {
    /// Specifier as written in `-st-from`
    pub request: String,
    /// Resolved absolute path (or the best lexical guess when the file does
    /// not exist)
    pub from: PathBuf,
    pub default_export: Option<String>,
    /// Local name → imported name
    pub named: BTreeMap<String, String>,
    pub span: Span,
}

impl Imported {
    /// Local names this record binds (named keys, then the default binding)
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.named
            .keys()
            .map(String::as_str)
            .chain(self.default_export.as_deref())
    }
}

/// Everything known about one stylesheet after processing
#[derive(Debug, Clone)]
pub struct Metadata {
    pub source: PathBuf,
    pub namespace: String,
    pub ast: Stylesheet,
    pub symbols: HashMap<String, Symbol>,
    /// Declaration order is significant
    pub imports: Vec<Imported>,
    /// `:--name` → selector list
    pub custom_selectors: BTreeMap<String, String>,
    /// Problems found while deriving this metadata
    pub diagnostics: Diagnostics,
}

impl Metadata {
    pub fn new(source: impl Into<PathBuf>, namespace: impl Into<String>, ast: Stylesheet) -> Self {
        let mut symbols = HashMap::new();
        symbols.insert(
            ROOT_CLASS.to_string(),
            Symbol::Class(ClassSymbol {
                name: ROOT_CLASS.to_string(),
                extends: None,
                span: Span::synthetic(),
            }),
        );
        Self {
            source: source.into(),
            namespace: namespace.into(),
            ast,
            symbols,
            imports: Vec::new(),
            custom_selectors: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn source_str(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// The import record a local import binding points at
    pub fn import_of(&self, symbol: &ImportSymbol) -> Option<&Imported> {
        self.imports.get(symbol.import)
    }

    /// Local class symbols, sorted by name
    pub fn classes(&self) -> Vec<&ClassSymbol> {
        let mut classes: Vec<_> = self
            .symbols
            .values()
            .filter_map(|symbol| match symbol {
                Symbol::Class(class) => Some(class),
                _ => None,
            })
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        classes
    }

    pub fn vars(&self) -> Vec<&VarSymbol> {
        let mut vars: Vec<_> = self
            .symbols
            .values()
            .filter_map(|symbol| match symbol {
                Symbol::Var(var) => Some(var),
                _ => None,
            })
            .collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        vars
    }

    pub fn keyframes(&self) -> Vec<&KeyframesSymbol> {
        let mut keyframes: Vec<_> = self
            .symbols
            .values()
            .filter_map(|symbol| match symbol {
                Symbol::Keyframes(keyframes) => Some(keyframes),
                _ => None,
            })
            .collect();
        keyframes.sort_by(|a, b| a.name.cmp(&b.name));
        keyframes
    }
}
