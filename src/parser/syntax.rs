//! Closed set of C# node kinds the extractor cares about.
//!
//! Grammar kind strings are mapped once here; everything downstream matches
//! on [`SyntaxKind`] instead of comparing strings.

use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    CompilationUnit,
    UsingDirective,
    NamespaceDeclaration,
    FileScopedNamespace,
    ClassDeclaration,
    StructDeclaration,
    InterfaceDeclaration,
    RecordDeclaration,
    EnumDeclaration,
    DelegateDeclaration,
    EnumMember,
    MethodDeclaration,
    ConstructorDeclaration,
    PropertyDeclaration,
    IndexerDeclaration,
    FieldDeclaration,
    EventFieldDeclaration,
    EventDeclaration,
    LocalDeclaration,
    LocalFunction,
    GlobalStatement,
    VariableDeclaration,
    VariableDeclarator,
    Parameter,
    BaseList,
    Invocation,
    MemberAccess,
    ConditionalAccess,
    MemberBinding,
    ObjectCreation,
    Lambda,
    Error,
    Other,
}

impl SyntaxKind {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "compilation_unit" => SyntaxKind::CompilationUnit,
            "using_directive" => SyntaxKind::UsingDirective,
            "namespace_declaration" => SyntaxKind::NamespaceDeclaration,
            "file_scoped_namespace_declaration" => SyntaxKind::FileScopedNamespace,
            "class_declaration" => SyntaxKind::ClassDeclaration,
            "struct_declaration" => SyntaxKind::StructDeclaration,
            "interface_declaration" => SyntaxKind::InterfaceDeclaration,
            "record_declaration" | "record_struct_declaration" => SyntaxKind::RecordDeclaration,
            "enum_declaration" => SyntaxKind::EnumDeclaration,
            "delegate_declaration" => SyntaxKind::DelegateDeclaration,
            "enum_member_declaration" => SyntaxKind::EnumMember,
            "method_declaration" => SyntaxKind::MethodDeclaration,
            "constructor_declaration" => SyntaxKind::ConstructorDeclaration,
            "property_declaration" => SyntaxKind::PropertyDeclaration,
            "indexer_declaration" => SyntaxKind::IndexerDeclaration,
            "field_declaration" => SyntaxKind::FieldDeclaration,
            "event_field_declaration" => SyntaxKind::EventFieldDeclaration,
            "event_declaration" => SyntaxKind::EventDeclaration,
            "local_declaration_statement" => SyntaxKind::LocalDeclaration,
            "local_function_statement" => SyntaxKind::LocalFunction,
            "global_statement" => SyntaxKind::GlobalStatement,
            "variable_declaration" => SyntaxKind::VariableDeclaration,
            "variable_declarator" => SyntaxKind::VariableDeclarator,
            "parameter" => SyntaxKind::Parameter,
            "base_list" => SyntaxKind::BaseList,
            "invocation_expression" => SyntaxKind::Invocation,
            "member_access_expression" => SyntaxKind::MemberAccess,
            "conditional_access_expression" => SyntaxKind::ConditionalAccess,
            "member_binding_expression" => SyntaxKind::MemberBinding,
            "object_creation_expression" => SyntaxKind::ObjectCreation,
            "lambda_expression"
            | "anonymous_method_expression"
            | "parenthesized_lambda_expression"
            | "simple_lambda_expression" => SyntaxKind::Lambda,
            "ERROR" => SyntaxKind::Error,
            _ => SyntaxKind::Other,
        }
    }

    pub fn of(node: &Node) -> Self {
        Self::from_kind(node.kind())
    }

    /// Declarations that introduce a type scope.
    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            SyntaxKind::ClassDeclaration
                | SyntaxKind::StructDeclaration
                | SyntaxKind::InterfaceDeclaration
                | SyntaxKind::RecordDeclaration
                | SyntaxKind::EnumDeclaration
        )
    }

    /// Split units for the boundary detector: anything that may sit directly
    /// in a namespace or compilation unit.
    pub fn is_top_level_declaration(self) -> bool {
        self.is_type_declaration() || self == SyntaxKind::DelegateDeclaration
    }

    pub fn is_namespace(self) -> bool {
        matches!(
            self,
            SyntaxKind::NamespaceDeclaration | SyntaxKind::FileScopedNamespace
        )
    }

    /// Members whose bodies form a scope for locals and parameters.
    pub fn is_member_scope(self) -> bool {
        matches!(
            self,
            SyntaxKind::MethodDeclaration
                | SyntaxKind::ConstructorDeclaration
                | SyntaxKind::LocalFunction
                | SyntaxKind::PropertyDeclaration
                | SyntaxKind::IndexerDeclaration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_kinds() {
        assert_eq!(
            SyntaxKind::from_kind("class_declaration"),
            SyntaxKind::ClassDeclaration
        );
        assert_eq!(
            SyntaxKind::from_kind("record_struct_declaration"),
            SyntaxKind::RecordDeclaration
        );
        assert_eq!(SyntaxKind::from_kind("ERROR"), SyntaxKind::Error);
        assert_eq!(SyntaxKind::from_kind("binary_expression"), SyntaxKind::Other);
    }

    #[test]
    fn test_categories() {
        assert!(SyntaxKind::EnumDeclaration.is_type_declaration());
        assert!(SyntaxKind::DelegateDeclaration.is_top_level_declaration());
        assert!(!SyntaxKind::NamespaceDeclaration.is_top_level_declaration());
        assert!(SyntaxKind::FileScopedNamespace.is_namespace());
        assert!(SyntaxKind::LocalFunction.is_member_scope());
    }
}
