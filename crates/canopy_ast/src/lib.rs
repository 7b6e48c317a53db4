//! The abstract syntax tree the rest of the core is built on.
//!
//! A real parser lives outside this crate; what it hands back is an arena
//! of [`Node`]s addressed by [`NodeId`]. Parent pointers and any other
//! back-edge are represented the same way — a plain integer looked up in
//! the arena — rather than as owning pointers, since the tree is allowed to
//! be (and AST/CFG back-edges routinely are) cyclic in spirit even though
//! the forward structure is a tree.

use canopy_hash::AHashMap;
use std::fmt;
use std::path::PathBuf;

pub type NodeId = usize;

/// The closed set of node kinds the core understands. Anything a parser
/// produces outside this set simply isn't representable — callers map their
/// own AST into this shape before handing it to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    ImportDeclaration,
    ExportNamedDeclaration,
    ExportDefaultDeclaration,
    ExportAllDeclaration,
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunction,
    AsyncFunction,
    GeneratorFunction,
    MethodDefinition,
    Class,
    ClassExpression,
    BlockStatement,
    IfStatement,
    ForStatement,
    WhileStatement,
    DoWhileStatement,
    SwitchStatement,
    SwitchCase,
    TryStatement,
    CatchClause,
    ReturnStatement,
    ThrowStatement,
    BreakStatement,
    ContinueStatement,
    BinaryExpression,
    LogicalExpression,
    UnaryExpression,
    ConditionalExpression,
    CallExpression,
    MemberExpression,
    AssignmentExpression,
    VariableDeclaration,
    Identifier,
    Literal,
    StringLiteral,
    NumberLiteral,
    ImportSpecifier,
    ImportDefaultSpecifier,
    ImportNamespaceSpecifier,
    ExpressionStatement,
}

impl NodeKind {
    /// A node is a function boundary when its own CFG starts here — nested
    /// bodies get their own CFG and must not be walked into by analyses
    /// that operate one function at a time (complexity contributors, dead
    /// code).
    pub fn is_function_boundary(self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDeclaration
                | NodeKind::FunctionExpression
                | NodeKind::ArrowFunction
                | NodeKind::AsyncFunction
                | NodeKind::GeneratorFunction
                | NodeKind::MethodDefinition
        )
    }
}

/// The literal payload of a `Literal`/`StringLiteral`/`NumberLiteral` node.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: PathBuf,
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, start_line: u32, end_line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            file: file.into(),
            start_line,
            end_line,
            start_col,
            end_col,
        }
    }

    /// A key identifying the node's position for deduplication purposes —
    /// a node visited through more than one typed child slot collapses to
    /// one occurrence when keyed this way.
    pub fn dedup_key(&self, kind: NodeKind) -> (NodeKind, PathBuf, u32, u32) {
        (kind, self.file.clone(), self.start_line, self.start_col)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.start_line, self.start_col)
    }
}

/// An AST node. Every field beyond `kind` and `location` is optional or
/// empty because most kinds only populate a handful of them — a
/// `BinaryExpression` has `left`/`right`/`operator` but no `body`, an
/// `IfStatement` has `test`/`consequent`/`alternate` but no `operator`.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: Option<String>,
    pub raw: Option<String>,
    pub value: Option<LiteralValue>,
    pub operator: Option<String>,
    /// The `"var"`/`"let"`/`"const"` keyword for a `VariableDeclaration`.
    pub decl_kind: Option<String>,
    pub location: Location,
    pub parent: Option<NodeId>,

    pub body: Vec<NodeId>,
    pub params: Vec<NodeId>,
    pub cases: Vec<NodeId>,
    pub handlers: Vec<NodeId>,
    pub arguments: Vec<NodeId>,
    pub declarations: Vec<NodeId>,
    pub specifiers: Vec<NodeId>,

    pub test: Option<NodeId>,
    pub consequent: Option<NodeId>,
    pub alternate: Option<NodeId>,
    pub init: Option<NodeId>,
    pub update: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub argument: Option<NodeId>,
    pub callee: Option<NodeId>,
    pub object: Option<NodeId>,
    pub property: Option<NodeId>,
    pub handler: Option<NodeId>,
    pub finalizer: Option<NodeId>,
}

impl Node {
    fn new(id: NodeId, kind: NodeKind, location: Location) -> Self {
        Self {
            id,
            kind,
            name: None,
            raw: None,
            value: None,
            operator: None,
            decl_kind: None,
            location,
            parent: None,
            body: Vec::new(),
            params: Vec::new(),
            cases: Vec::new(),
            handlers: Vec::new(),
            arguments: Vec::new(),
            declarations: Vec::new(),
            specifiers: Vec::new(),
            test: None,
            consequent: None,
            alternate: None,
            init: None,
            update: None,
            left: None,
            right: None,
            argument: None,
            callee: None,
            object: None,
            property: None,
            handler: None,
            finalizer: None,
        }
    }

    /// Every child slot in the fixed order the traversal visits them:
    /// typed lists first, then the singular slots.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        out.extend(&self.body);
        out.extend(&self.params);
        out.extend(&self.cases);
        out.extend(&self.handlers);
        out.extend(&self.arguments);
        out.extend(&self.declarations);
        out.extend(&self.specifiers);
        out.extend(
            [
                self.test,
                self.consequent,
                self.alternate,
                self.init,
                self.update,
                self.left,
                self.right,
                self.argument,
                self.callee,
                self.object,
                self.property,
                self.handler,
                self.finalizer,
            ]
            .into_iter()
            .flatten(),
        );
        out
    }
}

/// An arena of nodes. Nodes are addressed by [`NodeId`]; the arena itself
/// owns them, so cross-references (parent pointers, shared sub-expressions
/// reachable through more than one slot) are plain IDs rather than owning
/// pointers — the arena is the only owner.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: AHashMap<NodeId, Node>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Visits `start` and its descendants in pre-order using an explicit
    /// work stack rather than recursion, so a pathologically deep tree
    /// can't blow the call stack. `visitor` returns `true` to descend into
    /// a node's children, `false` to skip them — the traversal contract the
    /// core is built around.
    pub fn walk<F>(&self, start: NodeId, mut visitor: F)
    where
        F: FnMut(&Node) -> bool,
    {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if visitor(node) {
                // Push in reverse so children are visited left-to-right.
                for child in node.children().into_iter().rev() {
                    stack.push(child);
                }
            }
        }
    }

    /// Convenience over [`Ast::walk`] that always descends and collects
    /// every visited node's ID.
    pub fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(start, |node| {
            out.push(node.id);
            true
        });
        out
    }

    /// The nearest ancestor of `id` (inclusive) that is a function
    /// boundary, or `None` if `id` sits at the top level of the program.
    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.nodes.get(&cur)?;
            if node.kind.is_function_boundary() {
                return Some(cur);
            }
            current = node.parent;
        }
        None
    }
}

/// Builds an [`Ast`] node-by-node. A real parser would populate this arena
/// directly; tests use it to assemble small trees by hand.
#[derive(Debug, Default)]
pub struct AstBuilder {
    nodes: AHashMap<NodeId, Node>,
    next_id: NodeId,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind, location: Location) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, Node::new(id, kind, location));
        id
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(&id).expect("unknown node id")
    }

    /// Appends `child` to `parent`'s `body` slot and sets `child`'s parent
    /// pointer — the common case for statement lists.
    pub fn push_body(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(parent).body.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        self.node_mut(child).parent = Some(parent);
    }

    pub fn finish(self, root: NodeId) -> Ast {
        Ast {
            nodes: self.nodes,
            root: Some(root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> Location {
        Location::new("file.ts", line, line, 0, 10)
    }

    #[test]
    fn walk_visits_in_preorder_and_respects_descend_flag() {
        let mut b = AstBuilder::new();
        let program = b.add(NodeKind::Program, loc(1));
        let if_stmt = b.add(NodeKind::IfStatement, loc(2));
        let inner = b.add(NodeKind::BlockStatement, loc(3));
        let skipped_child = b.add(NodeKind::ExpressionStatement, loc(4));
        b.push_body(program, if_stmt);
        b.node_mut(if_stmt).consequent = Some(inner);
        b.set_parent(inner, if_stmt);
        b.push_body(inner, skipped_child);
        let ast = b.finish(program);

        let mut visited = Vec::new();
        ast.walk(program, |node| {
            visited.push(node.id);
            // Never descend into BlockStatement — its child must not appear.
            node.kind != NodeKind::BlockStatement
        });

        assert_eq!(visited, vec![program, if_stmt, inner]);
        assert!(!visited.contains(&skipped_child));
    }

    #[test]
    fn enclosing_function_walks_up_to_nearest_boundary() {
        let mut b = AstBuilder::new();
        let program = b.add(NodeKind::Program, loc(1));
        let func = b.add(NodeKind::FunctionDeclaration, loc(2));
        let block = b.add(NodeKind::BlockStatement, loc(3));
        let ret = b.add(NodeKind::ReturnStatement, loc(4));
        b.push_body(program, func);
        b.node_mut(func).body.push(block);
        b.set_parent(block, func);
        b.push_body(block, ret);
        let ast = b.finish(program);

        assert_eq!(ast.enclosing_function(ret), Some(func));
        assert_eq!(ast.enclosing_function(program), None);
    }

    #[test]
    fn children_returns_typed_slots_before_singular_slots() {
        let mut b = AstBuilder::new();
        let call = b.add(NodeKind::CallExpression, loc(1));
        let callee = b.add(NodeKind::Identifier, loc(1));
        let arg = b.add(NodeKind::Literal, loc(1));
        b.node_mut(call).arguments.push(arg);
        b.node_mut(call).callee = Some(callee);
        let ast = b.finish(call);

        assert_eq!(ast.node(call).unwrap().children(), vec![arg, callee]);
    }
}
