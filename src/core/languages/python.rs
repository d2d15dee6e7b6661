use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use regex::Regex;
use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::core::metadata::{SignalHandler, StepFact, TargetPattern, WorkflowMetadata};
use crate::error::{Result, WorkflowGraphError};
use super::{ExtractedFile, WorkflowExtractor};

/// Calls that schedule an activity
const ACTIVITY_CALLS: &[&str] = &[
    "execute_activity",
    "start_activity",
    "execute_activity_method",
    "start_activity_method",
    "execute_local_activity",
    "start_local_activity",
    "execute_local_activity_method",
];

/// Calls that run another workflow as a child
const CHILD_WORKFLOW_CALLS: &[&str] = &["execute_child_workflow", "start_child_workflow"];

/// Python workflow extractor using Tree-sitter
pub struct PythonWorkflowExtractor {
    parser: Parser,
    interpolation_regex: Regex,
    signal_name_regex: Regex,
}

/// State carried while walking one run method
struct RunMethodContext {
    workflow: String,
    steps: Vec<StepFact>,
    /// Enclosing (branch point index, outcome) pairs
    branch_stack: Vec<(usize, bool)>,
    /// Variables holding a decision or signal result
    branch_vars: HashMap<String, usize>,
    /// Variables holding an external workflow handle
    handle_vars: HashMap<String, TargetPattern>,
}

impl RunMethodContext {
    fn new(workflow: &str) -> Self {
        Self {
            workflow: workflow.to_string(),
            steps: Vec::new(),
            branch_stack: Vec::new(),
            branch_vars: HashMap::new(),
            handle_vars: HashMap::new(),
        }
    }

    fn push(&mut self, step: StepFact) -> usize {
        let index = self.steps.len();
        for &(point_index, outcome) in &self.branch_stack {
            if let Some(point) = self.steps[point_index].branch_point_mut() {
                point.record(outcome, index);
            }
        }
        self.steps.push(step);
        index
    }

    fn first_branch_point_since(&self, start: usize) -> Option<usize> {
        (start..self.steps.len()).find(|&i| self.steps[i].branch_point().is_some())
    }
}

impl PythonWorkflowExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| WorkflowGraphError::Parser(format!("Failed to set Python language: {}", e)))?;

        let interpolation_regex = Regex::new(r"\{[^{}]*\}")
            .map_err(|e| WorkflowGraphError::Parser(e.to_string()))?;
        let signal_name_regex = Regex::new(r#"name\s*=\s*["']([^"']+)["']"#)
            .map_err(|e| WorkflowGraphError::Parser(e.to_string()))?;

        Ok(Self {
            parser,
            interpolation_regex,
            signal_name_regex,
        })
    }
}

impl WorkflowExtractor for PythonWorkflowExtractor {
    fn extract(&mut self, content: &str, file_path: &Path) -> Result<ExtractedFile> {
        let tree = self.parser.parse(content, None).ok_or_else(|| {
            WorkflowGraphError::Parser(format!("Failed to parse Python code in {}", file_path.display()))
        })?;

        let root_node = tree.root_node();
        if root_node.has_error() {
            return Err(WorkflowGraphError::Parser(format!(
                "Syntax errors in {}",
                file_path.display()
            )));
        }

        let mut imports = BTreeMap::new();
        self.collect_imports(root_node, content, &mut imports);

        let mut workflows = Vec::new();
        let mut cursor = root_node.walk();
        for child in root_node.named_children(&mut cursor) {
            let (definition, decorators) = self.unwrap_decorated(child, content);
            if definition.kind() == "class_definition"
                && decorators.iter().any(|d| is_decorator(d, "workflow.defn"))
            {
                if let Some(workflow) = self.parse_workflow_class(definition, content, file_path) {
                    workflows.push(workflow);
                }
            }
        }

        Ok(ExtractedFile { workflows, imports })
    }

    fn module_candidates(&self, module: &str, current_dir: &Path) -> Vec<PathBuf> {
        let dots = module.chars().take_while(|c| *c == '.').count();
        let relative: PathBuf = module[dots..]
            .split('.')
            .filter(|segment| !segment.is_empty())
            .collect();

        if dots > 0 {
            let mut base = current_dir.to_path_buf();
            for _ in 1..dots {
                base.pop();
            }
            if relative.as_os_str().is_empty() {
                return vec![base.join("__init__.py")];
            }
            let target = base.join(&relative);
            return vec![target.with_extension("py"), target.join("__init__.py")];
        }

        if relative.as_os_str().is_empty() {
            return Vec::new();
        }

        vec![
            current_dir.join(&relative).with_extension("py"),
            relative.with_extension("py"),
        ]
    }

    fn file_extensions(&self) -> &[&str] {
        &["py"]
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

impl PythonWorkflowExtractor {
    /// Parse a class decorated with `@workflow.defn`
    fn parse_workflow_class(&self, node: Node, source: &str, file_path: &Path) -> Option<WorkflowMetadata> {
        let name = self.node_text(node.child_by_field_name("name")?, source);
        let body = node.child_by_field_name("body")?;

        let mut run_method = None;
        let mut signal_handlers = Vec::new();

        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let (definition, decorators) = self.unwrap_decorated(member, source);
            if definition.kind() != "function_definition" {
                continue;
            }
            let Some(method_name_node) = definition.child_by_field_name("name") else {
                continue;
            };
            let method_name = self.node_text(method_name_node, source);

            if decorators.iter().any(|d| is_decorator(d, "workflow.run")) {
                run_method = Some((method_name, definition));
            } else if let Some(decorator) = decorators.iter().find(|d| is_decorator(d, "workflow.signal")) {
                let signal_name = self
                    .signal_name_regex
                    .captures(decorator)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| method_name.clone());
                signal_handlers.push(SignalHandler::new(
                    &name,
                    signal_name,
                    method_name,
                    definition.start_position().row + 1,
                ));
            }
        }

        let (run_name, steps) = match run_method {
            Some((method_name, definition)) => {
                let mut ctx = RunMethodContext::new(&name);
                if let Some(run_body) = definition.child_by_field_name("body") {
                    self.visit(run_body, source, &mut ctx);
                }
                (method_name, ctx.steps)
            }
            None => {
                debug!("Workflow {} has no @workflow.run method", name);
                ("run".to_string(), Vec::new())
            }
        };

        Some(
            WorkflowMetadata::new(name, file_path, steps)
                .with_run_method(run_name)
                .with_signal_handlers(signal_handlers),
        )
    }

    /// Walk run method statements in source order
    fn visit(&self, node: Node, source: &str, ctx: &mut RunMethodContext) {
        match node.kind() {
            // Nested definitions are not part of the run path
            "function_definition" | "class_definition" | "decorated_definition" | "lambda" => {}
            "if_statement" => {
                let mut cursor = node.walk();
                let alternatives: Vec<Node> = node
                    .children_by_field_name("alternative", &mut cursor)
                    .collect();
                self.visit_conditional(
                    node.child_by_field_name("condition"),
                    node.child_by_field_name("consequence"),
                    &alternatives,
                    source,
                    ctx,
                );
            }
            "assignment" => self.visit_assignment(node, source, ctx),
            "call" => self.visit_call(node, source, ctx),
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit(child, source, ctx);
                }
            }
        }
    }

    fn visit_conditional(
        &self,
        condition: Option<Node>,
        consequence: Option<Node>,
        alternatives: &[Node],
        source: &str,
        ctx: &mut RunMethodContext,
    ) {
        let binding = condition.and_then(|c| self.bind_branch_point(c, source, ctx));

        match binding {
            Some((point, outcome)) => {
                ctx.branch_stack.push((point, outcome));
                if let Some(body) = consequence {
                    self.visit(body, source, ctx);
                }
                ctx.branch_stack.pop();

                ctx.branch_stack.push((point, !outcome));
                self.visit_alternatives(alternatives, source, ctx);
                ctx.branch_stack.pop();
            }
            None => {
                if let Some(body) = consequence {
                    self.visit(body, source, ctx);
                }
                self.visit_alternatives(alternatives, source, ctx);
            }
        }
    }

    fn visit_alternatives(&self, alternatives: &[Node], source: &str, ctx: &mut RunMethodContext) {
        let Some((first, rest)) = alternatives.split_first() else {
            return;
        };

        if first.kind() == "elif_clause" {
            self.visit_conditional(
                first.child_by_field_name("condition"),
                first.child_by_field_name("consequence"),
                rest,
                source,
                ctx,
            );
        } else {
            if let Some(body) = first.child_by_field_name("body") {
                self.visit(body, source, ctx);
            }
            self.visit_alternatives(rest, source, ctx);
        }
    }

    /// Find the branch point an `if` condition tests, visiting the condition.
    ///
    /// Returns the branch point index and the outcome selecting the consequence.
    fn bind_branch_point(&self, condition: Node, source: &str, ctx: &mut RunMethodContext) -> Option<(usize, bool)> {
        let (inner, negated) = strip_negation(condition);

        if inner.kind() == "identifier" {
            let variable = self.node_text(inner, source);
            return ctx.branch_vars.get(&variable).map(|&point| (point, !negated));
        }

        let start = ctx.steps.len();
        self.visit(condition, source, ctx);
        ctx.first_branch_point_since(start).map(|point| (point, !negated))
    }

    fn visit_assignment(&self, node: Node, source: &str, ctx: &mut RunMethodContext) {
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        let variable = node
            .child_by_field_name("left")
            .filter(|left| left.kind() == "identifier")
            .map(|left| self.node_text(left, source));

        if let Some(variable) = &variable {
            if let Some(target) = self.external_handle_target(right, source) {
                ctx.handle_vars.insert(variable.clone(), target);
                return;
            }
        }

        let start = ctx.steps.len();
        self.visit(right, source, ctx);

        if let Some(variable) = variable {
            if let Some(point) = ctx.first_branch_point_since(start) {
                ctx.branch_vars.insert(variable, point);
            }
        }
    }

    fn visit_call(&self, node: Node, source: &str, ctx: &mut RunMethodContext) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };

        // Inner expressions are evaluated before the call itself
        self.visit(function, source, ctx);
        if let Some(arguments) = node.child_by_field_name("arguments") {
            self.visit(arguments, source, ctx);
        }

        let function_text = self.node_text(function, source);
        let method = function_text.rsplit('.').next().unwrap_or("").trim();
        let (positional, keywords) = self.call_arguments(node, source);
        let line = node.start_position().row + 1;

        match method {
            m if ACTIVITY_CALLS.contains(&m) => {
                if let Some(first) = positional.first() {
                    let name = self.reference_name(*first, source);
                    ctx.push(StepFact::activity(name, line));
                }
            }
            "to_decision" => match self.literal_argument(&positional, &keywords, 1, "name", source) {
                Some(name) => {
                    ctx.push(StepFact::decision(name, line, Vec::new(), Vec::new()));
                }
                None => debug!("Skipping decision with non-literal name at line {}", line),
            },
            "wait_condition" => match self.literal_argument(&positional, &keywords, 2, "name", source) {
                Some(name) => {
                    ctx.push(StepFact::signal(name, line, Vec::new(), Vec::new()));
                }
                None => debug!("Skipping signal wait without literal name at line {}", line),
            },
            m if CHILD_WORKFLOW_CALLS.contains(&m) => {
                if let Some(first) = positional.first() {
                    let target = self.workflow_reference(*first, source);
                    let parent = ctx.workflow.clone();
                    ctx.push(StepFact::child_workflow(parent, target, line));
                }
            }
            "signal" => {
                let Some(target) = self.signal_target(function, source, ctx) else {
                    return;
                };
                match positional.first().and_then(|first| self.signal_reference(*first, source)) {
                    Some(signal_name) => {
                        let sender = ctx.workflow.clone();
                        ctx.push(StepFact::external_signal(sender, signal_name, target, line));
                    }
                    None => debug!("Skipping external signal with dynamic name at line {}", line),
                }
            }
            _ => {}
        }
    }

    /// Split call arguments into positional and keyword arguments
    fn call_arguments<'a>(&self, node: Node<'a>, source: &str) -> (Vec<Node<'a>>, Vec<(String, Node<'a>)>) {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();

        if let Some(arguments) = node.child_by_field_name("arguments") {
            let mut cursor = arguments.walk();
            for argument in arguments.named_children(&mut cursor) {
                match argument.kind() {
                    "comment" => {}
                    "keyword_argument" => {
                        if let (Some(name), Some(value)) = (
                            argument.child_by_field_name("name"),
                            argument.child_by_field_name("value"),
                        ) {
                            keywords.push((self.node_text(name, source), value));
                        }
                    }
                    _ => positional.push(argument),
                }
            }
        }

        (positional, keywords)
    }

    /// Plain string literal argument, by keyword or position
    fn literal_argument(
        &self,
        positional: &[Node],
        keywords: &[(String, Node)],
        index: usize,
        keyword: &str,
        source: &str,
    ) -> Option<String> {
        let node = keywords
            .iter()
            .find(|(name, _)| name == keyword)
            .map(|(_, value)| *value)
            .or_else(|| positional.get(index).copied())?;

        if node.kind() != "string" {
            return None;
        }
        match parse_string(&self.node_text(node, source)) {
            Some((false, content)) => Some(content),
            _ => None,
        }
    }

    /// Name of an activity reference (function, method or string name)
    fn reference_name(&self, node: Node, source: &str) -> String {
        match node.kind() {
            "attribute" => node
                .child_by_field_name("attribute")
                .map(|attr| self.node_text(attr, source))
                .unwrap_or_else(|| self.node_text(node, source)),
            "string" => parse_string(&self.node_text(node, source))
                .map(|(_, content)| content)
                .unwrap_or_else(|| self.node_text(node, source)),
            _ => self.node_text(node, source),
        }
    }

    /// Workflow class named by `Child.run`, `Child` or `"Child"`
    fn workflow_reference(&self, node: Node, source: &str) -> String {
        match node.kind() {
            "attribute" => {
                let object = node
                    .child_by_field_name("object")
                    .map(|obj| self.node_text(obj, source))
                    .unwrap_or_else(|| self.node_text(node, source));
                object.rsplit('.').next().unwrap_or(&object).to_string()
            }
            "string" => parse_string(&self.node_text(node, source))
                .map(|(_, content)| content)
                .unwrap_or_else(|| self.node_text(node, source)),
            _ => self.node_text(node, source),
        }
    }

    fn signal_reference(&self, node: Node, source: &str) -> Option<String> {
        match node.kind() {
            "string" => match parse_string(&self.node_text(node, source)) {
                Some((false, content)) => Some(content),
                _ => None,
            },
            "attribute" => node
                .child_by_field_name("attribute")
                .map(|attr| self.node_text(attr, source)),
            _ => None,
        }
    }

    /// Target of `<handle>.signal(...)` when the handle is an external workflow handle
    fn signal_target(&self, function: Node, source: &str, ctx: &RunMethodContext) -> Option<TargetPattern> {
        if function.kind() != "attribute" {
            return None;
        }
        let object = strip_wrappers(function.child_by_field_name("object")?);

        match object.kind() {
            "identifier" => ctx.handle_vars.get(&self.node_text(object, source)).cloned(),
            _ => self.external_handle_target(object, source),
        }
    }

    fn external_handle_target(&self, node: Node, source: &str) -> Option<TargetPattern> {
        let node = strip_wrappers(node);
        if node.kind() != "call" {
            return None;
        }
        let function = self.node_text(node.child_by_field_name("function")?, source);
        if function.rsplit('.').next() != Some("get_external_workflow_handle") {
            return None;
        }

        let (positional, keywords) = self.call_arguments(node, source);
        let id_node = keywords
            .iter()
            .find(|(name, _)| name == "workflow_id")
            .map(|(_, value)| *value)
            .or_else(|| positional.first().copied());
        Some(self.target_pattern(id_node, source))
    }

    fn target_pattern(&self, node: Option<Node>, source: &str) -> TargetPattern {
        let Some(node) = node.filter(|n| n.kind() == "string") else {
            return TargetPattern::Dynamic;
        };

        match parse_string(&self.node_text(node, source)) {
            Some((true, content)) => TargetPattern::Wildcard(
                self.interpolation_regex.replace_all(&content, "*").into_owned(),
            ),
            Some((false, content)) => TargetPattern::Literal(content),
            None => TargetPattern::Dynamic,
        }
    }

    /// Collect `import` and `from ... import` bindings anywhere in the file
    fn collect_imports(&self, node: Node, source: &str, imports: &mut BTreeMap<String, String>) {
        match node.kind() {
            "import_from_statement" => {
                let Some(module) = node
                    .child_by_field_name("module_name")
                    .map(|m| self.node_text(m, source))
                else {
                    return;
                };

                let mut cursor = node.walk();
                for name_node in node.children_by_field_name("name", &mut cursor) {
                    let local = if name_node.kind() == "aliased_import" {
                        name_node
                            .child_by_field_name("alias")
                            .map(|alias| self.node_text(alias, source))
                    } else {
                        let imported = self.node_text(name_node, source);
                        imported.rsplit('.').next().map(|s| s.to_string())
                    };
                    if let Some(local) = local {
                        imports.insert(local, module.clone());
                    }
                }
            }
            "import_statement" => {
                let mut cursor = node.walk();
                for name_node in node.children_by_field_name("name", &mut cursor) {
                    if name_node.kind() == "aliased_import" {
                        if let (Some(name), Some(alias)) = (
                            name_node.child_by_field_name("name"),
                            name_node.child_by_field_name("alias"),
                        ) {
                            imports.insert(self.node_text(alias, source), self.node_text(name, source));
                        }
                    } else {
                        let module = self.node_text(name_node, source);
                        imports.insert(module.clone(), module);
                    }
                }
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.collect_imports(child, source, imports);
                }
            }
        }
    }

    /// Split a possibly decorated definition into the definition and its decorators
    fn unwrap_decorated<'a>(&self, node: Node<'a>, source: &str) -> (Node<'a>, Vec<String>) {
        if node.kind() != "decorated_definition" {
            return (node, Vec::new());
        }

        let mut cursor = node.walk();
        let decorators = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "decorator")
            .map(|child| self.node_text(child, source))
            .collect();
        let definition = node.child_by_field_name("definition").unwrap_or(node);

        (definition, decorators)
    }

    /// Extract text content of a node
    fn node_text(&self, node: Node, source: &str) -> String {
        node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
    }
}

/// Check a decorator such as `@workflow.signal(name="x")` against a dotted name
fn is_decorator(decorator: &str, name: &str) -> bool {
    let target = decorator.trim().trim_start_matches('@');
    let target = target.split('(').next().unwrap_or("").trim();
    target == name || target.ends_with(&format!(".{}", name))
}

/// Remove `not` operators and parentheses, tracking negation
fn strip_negation(node: Node) -> (Node, bool) {
    let mut current = node;
    let mut negated = false;
    loop {
        match current.kind() {
            "not_operator" => match current.child_by_field_name("argument") {
                Some(argument) => {
                    negated = !negated;
                    current = argument;
                }
                None => break,
            },
            "parenthesized_expression" => match current.named_child(0) {
                Some(inner) => current = inner,
                None => break,
            },
            _ => break,
        }
    }
    (current, negated)
}

/// Remove `await` and parentheses around an expression
fn strip_wrappers(node: Node) -> Node {
    let mut current = node;
    while matches!(current.kind(), "await" | "parenthesized_expression") {
        match current.named_child(0) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Split a Python string literal into (is f-string, content)
fn parse_string(text: &str) -> Option<(bool, String)> {
    let quote_start = text.find(|c| c == '"' || c == '\'')?;
    let prefix = text[..quote_start].to_ascii_lowercase();
    let body = &text[quote_start..];

    let quote = if body.starts_with("\"\"\"") {
        "\"\"\""
    } else if body.starts_with("'''") {
        "'''"
    } else {
        &body[..1]
    };

    if body.len() < quote.len() * 2 || !body.ends_with(quote) {
        return None;
    }

    let content = &body[quote.len()..body.len() - quote.len()];
    Some((prefix.contains('f'), content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::StepKind;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const ORDER_WORKFLOW: &str = indoc! {r#"
        from datetime import timedelta
        from temporalio import workflow
        from temporalio_graphs import to_decision, wait_condition

        with workflow.unsafe.imports_passed_through():
            from .activities import validate_order, manager_review
            from .shipping import ShippingWorkflow as Shipping


        @workflow.defn
        class OrderWorkflow:
            def __init__(self) -> None:
                self.approved = False

            @workflow.signal
            async def approve(self) -> None:
                self.approved = True

            @workflow.signal(name="cancel-order")
            async def cancel(self) -> None:
                self.approved = False

            @workflow.run
            async def run(self, order_id: str) -> str:
                await workflow.execute_activity(validate_order, order_id, start_to_close_timeout=timedelta(seconds=10))
                if await to_decision(order_id.startswith("vip"), "HighValue"):
                    await workflow.execute_activity(manager_review, order_id)
                else:
                    await workflow.execute_activity("auto_approve", order_id)
                approved = await wait_condition(lambda: self.approved, timedelta(hours=1), "Approval")
                if not approved:
                    await workflow.execute_activity(cancel_order, order_id)
                    return "cancelled"
                await workflow.execute_child_workflow(Shipping.run, order_id)
                handle = workflow.get_external_workflow_handle(f"notify-{order_id}")
                await handle.signal("order_shipped", order_id)
                return "done"
    "#};

    fn line_of(source: &str, needle: &str) -> usize {
        source
            .lines()
            .position(|line| line.contains(needle))
            .map(|i| i + 1)
            .unwrap()
    }

    fn extract(source: &str) -> ExtractedFile {
        let mut extractor = PythonWorkflowExtractor::new().unwrap();
        extractor.extract(source, Path::new("workflows/order.py")).unwrap()
    }

    #[test]
    fn test_extracts_steps_in_source_order() {
        let extracted = extract(ORDER_WORKFLOW);
        assert_eq!(extracted.workflows.len(), 1);

        let workflow = &extracted.workflows[0];
        assert_eq!(workflow.name(), "OrderWorkflow");
        assert_eq!(workflow.run_method(), "run");
        assert_eq!(workflow.source_file(), Path::new("workflows/order.py"));

        let names: Vec<&str> = workflow.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "validate_order",
                "HighValue",
                "manager_review",
                "auto_approve",
                "Approval",
                "cancel_order",
                "Shipping",
                "order_shipped",
            ]
        );
        assert_eq!(workflow.decision_count(), 1);
        assert_eq!(workflow.signal_count(), 1);
        assert_eq!(workflow.total_paths(), 4);
        assert_eq!(workflow.steps()[2].line, line_of(ORDER_WORKFLOW, "manager_review, order_id"));
    }

    #[test]
    fn test_records_branch_membership() {
        let extracted = extract(ORDER_WORKFLOW);
        let steps = extracted.workflows[0].steps();

        let decision = steps[1].branch_point().unwrap();
        assert_eq!(decision.true_branch, vec![2]);
        assert_eq!(decision.false_branch, vec![3]);

        // `if not approved:` puts the body on the timeout side
        let signal = steps[4].branch_point().unwrap();
        assert!(signal.true_branch.is_empty());
        assert_eq!(signal.false_branch, vec![5]);
        assert!(matches!(steps[4].kind, StepKind::Signal(_)));
    }

    #[test]
    fn test_extracts_child_call_and_external_signal() {
        let extracted = extract(ORDER_WORKFLOW);
        let workflow = &extracted.workflows[0];

        let calls: Vec<_> = workflow.child_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parent_workflow, "OrderWorkflow");
        let call_line = line_of(ORDER_WORKFLOW, "execute_child_workflow");
        assert_eq!(calls[0].call_id, format!("child_shipping_{}", call_line));

        let signals: Vec<_> = workflow.external_signals().collect();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_name, "order_shipped");
        assert_eq!(signals[0].target, TargetPattern::Wildcard("notify-*".to_string()));
    }

    #[test]
    fn test_extracts_signal_handlers() {
        let extracted = extract(ORDER_WORKFLOW);
        let handlers = extracted.workflows[0].signal_handlers();

        let names: Vec<&str> = handlers.iter().map(|h| h.signal_name.as_str()).collect();
        assert_eq!(names, vec!["approve", "cancel-order"]);
        assert_eq!(handlers[1].method_name, "cancel");
        assert_eq!(handlers[1].workflow_name, "OrderWorkflow");
        assert_eq!(handlers[1].line, line_of(ORDER_WORKFLOW, "async def cancel"));
    }

    #[test]
    fn test_collects_imports() {
        let extracted = extract(ORDER_WORKFLOW);
        assert_eq!(extracted.imports.get("Shipping").map(String::as_str), Some(".shipping"));
        assert_eq!(extracted.imports.get("validate_order").map(String::as_str), Some(".activities"));
        assert_eq!(extracted.imports.get("timedelta").map(String::as_str), Some("datetime"));
    }

    #[test]
    fn test_elif_chain_nests_under_false_branch() {
        let source = indoc! {r#"
            @workflow.defn
            class Router:
                @workflow.run
                async def run(self, kind: str) -> None:
                    if await to_decision(kind == "a", "IsA"):
                        await workflow.execute_activity(handle_a)
                    elif await to_decision(kind == "b", "IsB"):
                        await workflow.execute_activity(handle_b)
                    else:
                        await workflow.execute_activity(handle_other)
        "#};

        let extracted = extract(source);
        let steps = extracted.workflows[0].steps();
        let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["IsA", "handle_a", "IsB", "handle_b", "handle_other"]);

        let is_a = steps[0].branch_point().unwrap();
        assert_eq!(is_a.true_branch, vec![1]);
        assert_eq!(is_a.false_branch, vec![2, 3, 4]);

        let is_b = steps[2].branch_point().unwrap();
        assert_eq!(is_b.true_branch, vec![3]);
        assert_eq!(is_b.false_branch, vec![4]);
    }

    #[test]
    fn test_non_workflow_file_has_no_workflows() {
        let extracted = extract("def helper():\n    return 1\n");
        assert!(extracted.workflows.is_empty());
    }

    #[test]
    fn test_syntax_error_is_parser_error() {
        let mut extractor = PythonWorkflowExtractor::new().unwrap();
        let result = extractor.extract("class Broken(:\n", Path::new("broken.py"));
        assert!(matches!(result, Err(WorkflowGraphError::Parser(_))));
    }

    #[test]
    fn test_dynamic_handle_target() {
        let source = indoc! {r#"
            @workflow.defn
            class Sender:
                @workflow.run
                async def run(self, target_id: str) -> None:
                    await workflow.get_external_workflow_handle(target_id).signal(Receiver.on_ping)
        "#};

        let extracted = extract(source);
        let signals: Vec<_> = extracted.workflows[0].external_signals().collect();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_name, "on_ping");
        assert_eq!(signals[0].target, TargetPattern::Dynamic);
    }

    #[test]
    fn test_module_candidates() {
        let extractor = PythonWorkflowExtractor::new().unwrap();
        let dir = Path::new("/repo/workflows");

        assert_eq!(
            extractor.module_candidates(".shipping", dir),
            vec![
                PathBuf::from("/repo/workflows/shipping.py"),
                PathBuf::from("/repo/workflows/shipping/__init__.py"),
            ]
        );
        assert_eq!(
            extractor.module_candidates("..common.billing", dir)[0],
            PathBuf::from("/repo/common/billing.py")
        );
        assert_eq!(
            extractor.module_candidates("workflows.shipping", dir),
            vec![
                PathBuf::from("/repo/workflows/workflows/shipping.py"),
                PathBuf::from("workflows/shipping.py"),
            ]
        );
    }

    #[test]
    fn test_parse_string_literals() {
        assert_eq!(parse_string("\"abc\""), Some((false, "abc".to_string())));
        assert_eq!(parse_string("f'id-{x}'"), Some((true, "id-{x}".to_string())));
        assert_eq!(parse_string("\"\"\"doc\"\"\""), Some((false, "doc".to_string())));
    }
}
