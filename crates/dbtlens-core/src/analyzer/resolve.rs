//! Name resolution of one parsed statement against a catalog snapshot.

use super::helpers::{error_at, first_ident, ident_range, is_date_part, object_name, span_range, suggest};
use super::scope::{columns_of, FrameTable, ScopeFrame};
use super::visit::{function_arg_expr, join_constraint};
use crate::catalog::{CatalogSnapshot, Column, ObjectName};
use crate::config::AnalyzerOptions;
use crate::error::AnalysisError;
use crate::types::{Analysis, ColumnRef, ColumnSource, OutputColumn};
use sqlparser::ast::{
    Expr, FunctionArguments, GroupByExpr, Ident, JoinConstraint, OrderBy, OrderByKind, Query,
    Select, SelectItem, SelectItemQualifiedWildcardKind, SetExpr, Spanned, TableFactor,
    TableWithJoins, WindowType,
};

/// A table column an expression resolved to.
#[derive(Debug, Clone)]
struct Resolved {
    table: ObjectName,
    column: Column,
}

#[derive(Debug, Clone)]
struct CteDefinition {
    name: String,
    /// `None` while a recursive CTE is still being resolved.
    columns: Option<Vec<Column>>,
}

pub(super) struct Resolver<'a> {
    catalog: &'a CatalogSnapshot,
    options: AnalyzerOptions,
    ctes: Vec<CteDefinition>,
    frames: Vec<ScopeFrame>,
    analysis: Analysis,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a CatalogSnapshot, options: AnalyzerOptions) -> Self {
        Self {
            catalog,
            options,
            ctes: Vec::new(),
            frames: Vec::new(),
            analysis: Analysis::default(),
        }
    }

    /// Resolves a top-level query; its output becomes the analysis output.
    pub fn statement_query(&mut self, query: &Query) -> Result<(), AnalysisError> {
        self.analysis.output_columns = self.query(query)?;
        Ok(())
    }

    pub fn finish(self) -> Analysis {
        self.analysis
    }

    fn query(&mut self, query: &Query) -> Result<Vec<OutputColumn>, AnalysisError> {
        let mark = self.ctes.len();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.clone();
                if with.recursive {
                    self.ctes.push(CteDefinition {
                        name: name.clone(),
                        columns: None,
                    });
                }
                let outputs = self.query(&cte.query)?;
                if with.recursive {
                    self.ctes.pop();
                }
                self.ctes.push(CteDefinition {
                    name,
                    columns: Some(columns_of(&outputs)),
                });
            }
        }

        let result = match query.body.as_ref() {
            SetExpr::Select(select) => self.select(select, query.order_by.as_ref()),
            other => self.set_expr(other),
        };
        self.ctes.truncate(mark);
        result
    }

    fn set_expr(&mut self, body: &SetExpr) -> Result<Vec<OutputColumn>, AnalysisError> {
        match body {
            SetExpr::Select(select) => self.select(select, None),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation { left, right, .. } => {
                let outputs = self.set_expr(left)?;
                self.set_expr(right)?;
                Ok(outputs)
            }
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for expr in row {
                        self.expr(expr, &[])?;
                    }
                }
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn select(
        &mut self,
        select: &Select,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<OutputColumn>, AnalysisError> {
        let mut frame = ScopeFrame::default();
        for table in &select.from {
            self.table_with_joins(table, &mut frame)?;
        }

        self.frames.push(frame);
        let result = self.select_body(select, order_by);
        let frame = self.frames.pop().unwrap_or_default();

        if result.is_ok() {
            let range = span_range(select.span()).unwrap_or_default();
            self.analysis.scopes.push(frame.into_scope(range));
        }
        result
    }

    fn select_body(
        &mut self,
        select: &Select,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<OutputColumn>, AnalysisError> {
        for table in &select.from {
            for join in &table.joins {
                if let Some(JoinConstraint::On(expr)) = join_constraint(&join.join_operator) {
                    self.expr(expr, &[])?;
                }
            }
        }

        let mut outputs = Vec::with_capacity(select.projection.len());
        for (index, item) in select.projection.iter().enumerate() {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let resolved = self.expr(expr, &[])?;
                    outputs.push(output_column(expr, None, resolved, index));
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    let resolved = self.expr(expr, &[])?;
                    outputs.push(output_column(expr, Some(alias), resolved, index));
                }
                SelectItem::Wildcard(_) => {
                    if let Some(frame) = self.frames.last() {
                        outputs.extend(frame.wildcard(None));
                    }
                }
                SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::ObjectName(name), _) => {
                    let qualifier = object_name(name);
                    if let Some(frame) = self.frames.last() {
                        outputs.extend(frame.wildcard(Some(qualifier.parts())));
                    }
                }
                SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::Expr(expr), _) => {
                    self.expr(expr, &[])?;
                }
            }
        }

        if let Some(selection) = &select.selection {
            self.expr(selection, &[])?;
        }
        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                self.expr(expr, &outputs)?;
            }
        }
        for expr in [&select.having, &select.qualify].into_iter().flatten() {
            self.expr(expr, &outputs)?;
        }
        if let Some(OrderByKind::Expressions(exprs)) = order_by.map(|order_by| &order_by.kind) {
            for order_expr in exprs {
                self.expr(&order_expr.expr, &outputs)?;
            }
        }
        Ok(outputs)
    }

    fn table_with_joins(
        &mut self,
        table: &TableWithJoins,
        frame: &mut ScopeFrame,
    ) -> Result<(), AnalysisError> {
        self.table_factor(&table.relation, frame)?;
        for join in &table.joins {
            self.table_factor(&join.relation, frame)?;
        }
        Ok(())
    }

    fn table_factor(&mut self, factor: &TableFactor, frame: &mut ScopeFrame) -> Result<(), AnalysisError> {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                let written = object_name(name);
                let alias = alias.as_ref().map(|alias| alias.name.value.clone());
                if args.is_some() {
                    frame.tables.push(FrameTable::opaque(written, alias));
                    return Ok(());
                }

                if let Some(cte) = self.cte(&written) {
                    let table = match &cte.columns {
                        Some(columns) => {
                            FrameTable::known(written.clone(), written, alias, columns.clone())
                        }
                        None => FrameTable::opaque(written, alias),
                    };
                    frame.tables.push(table);
                    return Ok(());
                }

                match self.catalog.find_table(&written) {
                    Some(object) => {
                        if !self.analysis.tables.contains(&object.identity) {
                            self.analysis.tables.push(object.identity.clone());
                        }
                        frame.tables.push(FrameTable::known(
                            object.identity.clone(),
                            written,
                            alias,
                            object.columns.clone(),
                        ));
                    }
                    None if self.options.strict_tables => {
                        return Err(error_at(format!("Table not found: {written}"), first_ident(name)));
                    }
                    None => frame.tables.push(FrameTable::opaque(written, alias)),
                }
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let outputs = self.query(subquery)?;
                let alias = alias.as_ref().map(|alias| alias.name.value.clone());
                let name = ObjectName::new([alias.clone().unwrap_or_else(|| "$subquery".to_string())]);
                frame
                    .tables
                    .push(FrameTable::known(name.clone(), name, alias, columns_of(&outputs)));
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.table_with_joins(table_with_joins, frame)?,
            TableFactor::UNNEST {
                alias, array_exprs, ..
            } => {
                // Array elements may refer to tables joined before them.
                self.frames.push(frame.clone());
                let resolved = array_exprs
                    .iter()
                    .try_for_each(|expr| self.expr(expr, &[]).map(|_| ()));
                self.frames.pop();
                resolved?;
                let alias = alias.as_ref().map(|alias| alias.name.value.clone());
                frame
                    .tables
                    .push(FrameTable::opaque(ObjectName::new(["$unnest"]), alias));
            }
            _ => frame
                .tables
                .push(FrameTable::opaque(ObjectName::new(["$relation"]), None)),
        }
        Ok(())
    }

    fn cte(&self, name: &ObjectName) -> Option<&CteDefinition> {
        if name.len() != 1 {
            return None;
        }
        let wanted = name.last()?;
        self.ctes
            .iter()
            .rev()
            .find(|cte| cte.name.eq_ignore_ascii_case(wanted))
    }

    /// Walks `expr`, resolving every identifier in it. `aliases` are the
    /// projection names visible in the current clause.
    ///
    /// Returns the table column when `expr` is itself a column reference.
    fn expr(&mut self, expr: &Expr, aliases: &[OutputColumn]) -> Result<Option<Resolved>, AnalysisError> {
        match expr {
            Expr::Identifier(ident) => return self.identifier(std::slice::from_ref(ident), aliases),
            Expr::CompoundIdentifier(idents) => return self.identifier(idents, aliases),
            Expr::Nested(inner) => return self.expr(inner, aliases),
            Expr::BinaryOp { left, right, .. }
            | Expr::AnyOp { left, right, .. }
            | Expr::AllOp { left, right, .. }
            | Expr::IsDistinctFrom(left, right)
            | Expr::IsNotDistinctFrom(left, right) => {
                self.expr(left, aliases)?;
                self.expr(right, aliases)?;
            }
            Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
                self.expr(expr, aliases)?;
                self.expr(pattern, aliases)?;
            }
            Expr::UnaryOp { expr: inner, .. }
            | Expr::Cast { expr: inner, .. }
            | Expr::Extract { expr: inner, .. }
            | Expr::Ceil { expr: inner, .. }
            | Expr::Floor { expr: inner, .. }
            | Expr::IsNull(inner)
            | Expr::IsNotNull(inner)
            | Expr::IsTrue(inner)
            | Expr::IsNotTrue(inner)
            | Expr::IsFalse(inner)
            | Expr::IsNotFalse(inner) => {
                self.expr(inner, aliases)?;
            }
            Expr::AtTimeZone {
                timestamp,
                time_zone,
            } => {
                self.expr(timestamp, aliases)?;
                self.expr(time_zone, aliases)?;
            }
            Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                self.expr(expr, aliases)?;
                for part in [substring_from, substring_for].into_iter().flatten() {
                    self.expr(part, aliases)?;
                }
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(operand) = operand {
                    self.expr(operand, aliases)?;
                }
                for case_when in conditions {
                    self.expr(&case_when.condition, aliases)?;
                    self.expr(&case_when.result, aliases)?;
                }
                if let Some(else_result) = else_result {
                    self.expr(else_result, aliases)?;
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.expr(expr, aliases)?;
                self.expr(low, aliases)?;
                self.expr(high, aliases)?;
            }
            Expr::InList { expr, list, .. } => {
                self.expr(expr, aliases)?;
                for item in list {
                    self.expr(item, aliases)?;
                }
            }
            Expr::Tuple(items) => {
                for item in items {
                    self.expr(item, aliases)?;
                }
            }
            Expr::InSubquery {
                expr: inner,
                subquery,
                ..
            } => {
                self.expr(inner, aliases)?;
                self.query(subquery)?;
            }
            Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => {
                self.query(subquery)?;
            }
            Expr::Function(func) => {
                let name = object_name(&func.name);
                if name.len() >= 2
                    && self.options.strict_tables
                    && self.catalog.find_function(&name).is_none()
                {
                    return Err(error_at(
                        format!("Function not found: {name}"),
                        first_ident(&func.name),
                    ));
                }
                match &func.args {
                    FunctionArguments::Subquery(query) => {
                        self.query(query)?;
                    }
                    FunctionArguments::List(list) => {
                        for arg in &list.args {
                            let Some(expr) = function_arg_expr(arg) else {
                                continue;
                            };
                            if matches!(expr, Expr::Identifier(ident) if is_date_part(&ident.value)) {
                                continue;
                            }
                            self.expr(expr, aliases)?;
                        }
                    }
                    FunctionArguments::None => {}
                }
                if let Some(WindowType::WindowSpec(spec)) = &func.over {
                    for expr in &spec.partition_by {
                        self.expr(expr, aliases)?;
                    }
                    for order_expr in &spec.order_by {
                        self.expr(&order_expr.expr, aliases)?;
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }

    /// Resolves `a`, `t.a`, `dataset.t.a` or `struct_col.field`.
    fn identifier(
        &mut self,
        idents: &[Ident],
        aliases: &[OutputColumn],
    ) -> Result<Option<Resolved>, AnalysisError> {
        let Some(first) = idents.first() else {
            return Ok(None);
        };
        let parts: Vec<String> = idents.iter().map(|ident| ident.value.clone()).collect();

        // Longest qualifier first: `d.t.a` before `t.a`.
        for split in (1..idents.len()).rev() {
            let (qualifier, rest) = parts.split_at(split);
            let found = self.frames.iter().rev().find_map(|frame| {
                frame
                    .tables
                    .iter()
                    .find(|table| table.matches_qualifier(qualifier))
                    .cloned()
            });
            let Some(table) = found else {
                continue;
            };
            let column_ident = &idents[split];
            return match table.column(&rest[0]) {
                Some(column) => Ok(Some(self.record(&table, column.clone(), column_ident))),
                None if table.known && self.options.strict_columns => {
                    let qualifier = qualifier.join(".");
                    Err(error_at(
                        format!("Name {} not found inside {qualifier}", rest[0]),
                        Some(column_ident),
                    ))
                }
                None => Ok(None),
            };
        }

        // No qualifier matched; the first part is a column (`struct_col.field`).
        let name = &first.value;
        let found = self.frames.iter().rev().find_map(|frame| {
            frame.tables.iter().find_map(|table| {
                table
                    .column(name)
                    .map(|column| (table.clone(), column.clone()))
            })
        });
        if let Some((table, column)) = found {
            let resolved = self.record(&table, column, first);
            return Ok((idents.len() == 1).then_some(resolved));
        }

        if idents.len() == 1 {
            if aliases.iter().any(|alias| alias.name.eq_ignore_ascii_case(name)) {
                return Ok(None);
            }
            let is_table_value = self
                .frames
                .iter()
                .any(|frame| frame.tables.iter().any(|table| table.matches_qualifier(&parts)));
            if is_table_value {
                return Ok(None);
            }
        }

        if self.can_reject_names() {
            let candidates: Vec<&str> = self
                .frames
                .iter()
                .flat_map(|frame| frame.column_names().chain(frame.qualifiers()))
                .chain(aliases.iter().map(|alias| alias.name.as_str()))
                .collect();
            let message = match suggest(name, candidates) {
                Some(suggestion) => format!("Unrecognized name: {name}; Did you mean {suggestion}?"),
                None => format!("Unrecognized name: {name}"),
            };
            return Err(error_at(message, Some(first)));
        }
        Ok(None)
    }

    /// Unqualified names are only rejected when every visible table has a
    /// known column list.
    fn can_reject_names(&self) -> bool {
        self.options.strict_columns
            && self.frames.last().is_some_and(|frame| !frame.tables.is_empty())
            && self.frames.iter().all(ScopeFrame::is_fully_known)
    }

    fn record(&mut self, table: &FrameTable, column: Column, ident: &Ident) -> Resolved {
        self.analysis.column_refs.push(ColumnRef {
            range: ident_range(ident),
            table: table.name.clone(),
            column: column.name.clone(),
            data_type: Some(column.data_type.clone()),
        });
        Resolved {
            table: table.name.clone(),
            column,
        }
    }
}

fn output_column(
    expr: &Expr,
    alias: Option<&Ident>,
    resolved: Option<Resolved>,
    index: usize,
) -> OutputColumn {
    let name = match (alias, expr) {
        (Some(alias), _) => alias.value.clone(),
        (None, Expr::Identifier(ident)) => ident.value.clone(),
        (None, Expr::CompoundIdentifier(idents)) => idents
            .last()
            .map(|ident| ident.value.clone())
            .unwrap_or_default(),
        (None, _) => format!("$col{}", index + 1),
    };
    let data_type = match expr {
        Expr::Cast { data_type, .. } => Some(data_type.to_string()),
        _ => resolved.as_ref().map(|resolved| resolved.column.data_type.clone()),
    };
    OutputColumn {
        name,
        aliased: alias.is_some(),
        source: resolved.map(|resolved| ColumnSource {
            table: resolved.table,
            column: resolved.column.name,
        }),
        data_type,
    }
}
