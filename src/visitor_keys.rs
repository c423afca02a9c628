//! Visitor key registry
//!
//! Maps a node type to the ordered list of fields that hold its children.
//! Traversal order is driven entirely by this table, so new node types only
//! need a table entry, never traversal code.

use crate::tree::Tree;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Node type -> ordered child field names
pub type KeyTable = BTreeMap<String, Vec<String>>;

/// Error building a registry from extension entries
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("visitor key `{field}` for {kind} is not present on any {kind} node")]
    UnknownField { kind: String, field: String },

    #[error("visitor key `{field}` is listed more than once for {kind}")]
    DuplicateField { kind: String, field: String },
}

/// Immutable node type -> child fields registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorKeys {
    keys: HashMap<String, Vec<String>>,
}

impl VisitorKeys {
    /// Create a registry from a default table.
    ///
    /// Repeated field names within an entry are collapsed to their first
    /// occurrence so no child is visited twice.
    pub fn new<I, K, F, S>(table: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = table
            .into_iter()
            .map(|(kind, fields)| {
                let mut seen = HashSet::new();
                let fields: Vec<String> = fields
                    .into_iter()
                    .map(Into::into)
                    .filter(|f| seen.insert(f.clone()))
                    .collect();
                (kind.into(), fields)
            })
            .collect();
        Self { keys }
    }

    /// Standard ESTree keys (ES2022)
    pub fn estree() -> Self {
        Self::new(ESTREE_KEYS.iter().map(|(k, f)| (*k, f.iter().copied())))
    }

    /// ESTree keys plus the TypeScript ESTree node types
    pub fn typescript() -> Self {
        let mut keys = Self::estree();
        for (kind, fields) in TYPESCRIPT_KEYS {
            keys.keys.insert(
                kind.to_string(),
                fields.iter().map(|f| f.to_string()).collect(),
            );
        }
        keys
    }

    /// Build a registry from `defaults` plus `extensions`.
    ///
    /// An extension entry fully replaces the default entry for its type. Each
    /// extension field is checked against the node shapes observed in `tree`:
    /// if the tree holds nodes of that type and none carries the field, the
    /// extension is rejected here rather than silently skipped during traversal.
    pub fn build(
        defaults: &VisitorKeys,
        extensions: &KeyTable,
        tree: &Tree,
    ) -> Result<Self, RegistryError> {
        if extensions.is_empty() {
            return Ok(defaults.clone());
        }

        let mut observed: HashMap<&str, HashSet<&str>> = HashMap::new();
        let mut seen_kinds: HashSet<&str> = HashSet::new();
        for node in tree.nodes() {
            if extensions.contains_key(node.kind()) {
                seen_kinds.insert(node.kind());
                observed
                    .entry(node.kind())
                    .or_default()
                    .extend(node.field_names());
            }
        }

        let mut keys = defaults.keys.clone();
        for (kind, fields) in extensions {
            let mut unique = HashSet::new();
            for field in fields {
                if !unique.insert(field.as_str()) {
                    return Err(RegistryError::DuplicateField {
                        kind: kind.clone(),
                        field: field.clone(),
                    });
                }
                if seen_kinds.contains(kind.as_str())
                    && !observed
                        .get(kind.as_str())
                        .is_some_and(|names| names.contains(field.as_str()))
                {
                    return Err(RegistryError::UnknownField {
                        kind: kind.clone(),
                        field: field.clone(),
                    });
                }
            }
            keys.insert(kind.clone(), fields.clone());
        }

        log::debug!(
            "visitor keys: {} defaults, {} extension entries",
            defaults.len(),
            extensions.len()
        );
        Ok(Self { keys })
    }

    /// Ordered child fields for `kind`; empty for leaf or unknown types
    pub fn child_fields(&self, kind: &str) -> &[String] {
        self.keys.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.keys.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered node types in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

const ESTREE_KEYS: &[(&str, &[&str])] = &[
    ("ArrayExpression", &["elements"]),
    ("ArrayPattern", &["elements"]),
    ("ArrowFunctionExpression", &["params", "body"]),
    ("AssignmentExpression", &["left", "right"]),
    ("AssignmentPattern", &["left", "right"]),
    ("AwaitExpression", &["argument"]),
    ("BinaryExpression", &["left", "right"]),
    ("BlockStatement", &["body"]),
    ("BreakStatement", &["label"]),
    ("CallExpression", &["callee", "arguments"]),
    ("CatchClause", &["param", "body"]),
    ("ChainExpression", &["expression"]),
    ("ClassBody", &["body"]),
    ("ClassDeclaration", &["id", "superClass", "body"]),
    ("ClassExpression", &["id", "superClass", "body"]),
    ("ConditionalExpression", &["test", "consequent", "alternate"]),
    ("ContinueStatement", &["label"]),
    ("DebuggerStatement", &[]),
    ("DoWhileStatement", &["body", "test"]),
    ("EmptyStatement", &[]),
    ("ExportAllDeclaration", &["exported", "source"]),
    ("ExportDefaultDeclaration", &["declaration"]),
    ("ExportNamedDeclaration", &["declaration", "specifiers", "source"]),
    ("ExportSpecifier", &["exported", "local"]),
    ("ExpressionStatement", &["expression"]),
    ("ForInStatement", &["left", "right", "body"]),
    ("ForOfStatement", &["left", "right", "body"]),
    ("ForStatement", &["init", "test", "update", "body"]),
    ("FunctionDeclaration", &["id", "params", "body"]),
    ("FunctionExpression", &["id", "params", "body"]),
    ("Identifier", &[]),
    ("IfStatement", &["test", "consequent", "alternate"]),
    ("ImportDeclaration", &["specifiers", "source"]),
    ("ImportDefaultSpecifier", &["local"]),
    ("ImportExpression", &["source"]),
    ("ImportNamespaceSpecifier", &["local"]),
    ("ImportSpecifier", &["imported", "local"]),
    ("LabeledStatement", &["label", "body"]),
    ("Literal", &[]),
    ("LogicalExpression", &["left", "right"]),
    ("MemberExpression", &["object", "property"]),
    ("MetaProperty", &["meta", "property"]),
    ("MethodDefinition", &["key", "value"]),
    ("NewExpression", &["callee", "arguments"]),
    ("ObjectExpression", &["properties"]),
    ("ObjectPattern", &["properties"]),
    ("PrivateIdentifier", &[]),
    ("Program", &["body"]),
    ("Property", &["key", "value"]),
    ("PropertyDefinition", &["key", "value"]),
    ("RestElement", &["argument"]),
    ("ReturnStatement", &["argument"]),
    ("SequenceExpression", &["expressions"]),
    ("SpreadElement", &["argument"]),
    ("StaticBlock", &["body"]),
    ("Super", &[]),
    ("SwitchCase", &["test", "consequent"]),
    ("SwitchStatement", &["discriminant", "cases"]),
    ("TaggedTemplateExpression", &["tag", "quasi"]),
    ("TemplateElement", &[]),
    ("TemplateLiteral", &["quasis", "expressions"]),
    ("ThisExpression", &[]),
    ("ThrowStatement", &["argument"]),
    ("TryStatement", &["block", "handler", "finalizer"]),
    ("UnaryExpression", &["argument"]),
    ("UpdateExpression", &["argument"]),
    ("VariableDeclaration", &["declarations"]),
    ("VariableDeclarator", &["id", "init"]),
    ("WhileStatement", &["test", "body"]),
    ("WithStatement", &["object", "body"]),
    ("YieldExpression", &["argument"]),
];

const TYPESCRIPT_KEYS: &[(&str, &[&str])] = &[
    // ESTree types that gain type-level children
    ("ArrowFunctionExpression", &["typeParameters", "params", "returnType", "body"]),
    ("CallExpression", &["callee", "typeArguments", "arguments"]),
    (
        "ClassDeclaration",
        &["decorators", "id", "typeParameters", "superClass", "superTypeArguments", "implements", "body"],
    ),
    (
        "ClassExpression",
        &["decorators", "id", "typeParameters", "superClass", "superTypeArguments", "implements", "body"],
    ),
    ("Decorator", &["expression"]),
    ("FunctionDeclaration", &["id", "typeParameters", "params", "returnType", "body"]),
    ("FunctionExpression", &["id", "typeParameters", "params", "returnType", "body"]),
    ("Identifier", &["decorators", "typeAnnotation"]),
    ("MethodDefinition", &["decorators", "key", "value"]),
    ("NewExpression", &["callee", "typeArguments", "arguments"]),
    ("PropertyDefinition", &["decorators", "key", "typeAnnotation", "value"]),
    ("TSAbstractMethodDefinition", &["decorators", "key", "value"]),
    ("TSAbstractPropertyDefinition", &["decorators", "key", "typeAnnotation"]),
    ("TSAnyKeyword", &[]),
    ("TSArrayType", &["elementType"]),
    ("TSAsExpression", &["expression", "typeAnnotation"]),
    ("TSBooleanKeyword", &[]),
    ("TSCallSignatureDeclaration", &["typeParameters", "params", "returnType"]),
    ("TSClassImplements", &["expression", "typeArguments"]),
    ("TSConditionalType", &["checkType", "extendsType", "trueType", "falseType"]),
    ("TSConstructSignatureDeclaration", &["typeParameters", "params", "returnType"]),
    ("TSConstructorType", &["typeParameters", "params", "returnType"]),
    ("TSDeclareFunction", &["id", "typeParameters", "params", "returnType"]),
    ("TSEnumDeclaration", &["id", "members"]),
    ("TSEnumMember", &["id", "initializer"]),
    ("TSExportAssignment", &["expression"]),
    ("TSExternalModuleReference", &["expression"]),
    ("TSFunctionType", &["typeParameters", "params", "returnType"]),
    ("TSImportEqualsDeclaration", &["id", "moduleReference"]),
    ("TSImportType", &["argument", "qualifier", "typeArguments"]),
    ("TSIndexSignature", &["parameters", "typeAnnotation"]),
    ("TSIndexedAccessType", &["indexType", "objectType"]),
    ("TSInferType", &["typeParameter"]),
    ("TSInterfaceBody", &["body"]),
    ("TSInterfaceDeclaration", &["id", "typeParameters", "extends", "body"]),
    ("TSInterfaceHeritage", &["expression", "typeArguments"]),
    ("TSIntersectionType", &["types"]),
    ("TSLiteralType", &["literal"]),
    ("TSMappedType", &["key", "constraint", "nameType", "typeAnnotation"]),
    ("TSMethodSignature", &["typeParameters", "key", "params", "returnType"]),
    ("TSModuleBlock", &["body"]),
    ("TSModuleDeclaration", &["id", "body"]),
    ("TSNamedTupleMember", &["label", "elementType"]),
    ("TSNeverKeyword", &[]),
    ("TSNonNullExpression", &["expression"]),
    ("TSNullKeyword", &[]),
    ("TSNumberKeyword", &[]),
    ("TSObjectKeyword", &[]),
    ("TSOptionalType", &["typeAnnotation"]),
    ("TSParameterProperty", &["decorators", "parameter"]),
    ("TSPropertySignature", &["key", "typeAnnotation"]),
    ("TSQualifiedName", &["left", "right"]),
    ("TSRestType", &["typeAnnotation"]),
    ("TSSatisfiesExpression", &["expression", "typeAnnotation"]),
    ("TSStringKeyword", &[]),
    ("TSSymbolKeyword", &[]),
    ("TSThisType", &[]),
    ("TSTupleType", &["elementTypes"]),
    ("TSTypeAliasDeclaration", &["id", "typeParameters", "typeAnnotation"]),
    ("TSTypeAnnotation", &["typeAnnotation"]),
    ("TSTypeAssertion", &["typeAnnotation", "expression"]),
    ("TSTypeLiteral", &["members"]),
    ("TSTypeOperator", &["typeAnnotation"]),
    ("TSTypeParameter", &["name", "constraint", "default"]),
    ("TSTypeParameterDeclaration", &["params"]),
    ("TSTypeParameterInstantiation", &["params"]),
    ("TSTypePredicate", &["parameterName", "typeAnnotation"]),
    ("TSTypeQuery", &["exprName", "typeArguments"]),
    ("TSTypeReference", &["typeName", "typeArguments"]),
    ("TSUndefinedKeyword", &[]),
    ("TSUnionType", &["types"]),
    ("TSUnknownKeyword", &[]),
    ("TSVoidKeyword", &[]),
];
