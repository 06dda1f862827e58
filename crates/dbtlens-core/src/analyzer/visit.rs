//! AST walking shared by reference extraction.
//!
//! Only the parts of a statement that can name a table or call a function
//! are visited.

use sqlparser::ast::*;

/// Something a statement refers to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reference<'a> {
    Relation(&'a ObjectName),
    Cte(&'a Ident),
    Function(&'a Function),
}

pub(crate) fn visit_statement<'a, F: FnMut(Reference<'a>)>(stmt: &'a Statement, visitor: &mut F) {
    match stmt {
        Statement::Query(query) => visit_query(query, visitor),
        Statement::CreateView { query, .. } => visit_query(query, visitor),
        Statement::CreateTable(create) => {
            if let Some(query) = &create.query {
                visit_query(query, visitor);
            }
        }
        Statement::Insert(insert) => {
            if let Some(source) = &insert.source {
                visit_query(source, visitor);
            }
        }
        _ => {}
    }
}

pub(crate) fn visit_query<'a, F: FnMut(Reference<'a>)>(query: &'a Query, visitor: &mut F) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            visitor(Reference::Cte(&cte.alias.name));
            visit_query(&cte.query, visitor);
        }
    }
    visit_set_expr(&query.body, visitor);

    if let Some(order_by) = &query.order_by {
        if let OrderByKind::Expressions(exprs) = &order_by.kind {
            for order_expr in exprs {
                visit_expr(&order_expr.expr, visitor);
            }
        }
    }
}

fn visit_set_expr<'a, F: FnMut(Reference<'a>)>(body: &'a SetExpr, visitor: &mut F) {
    match body {
        SetExpr::Select(select) => {
            for item in &select.projection {
                if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item
                {
                    visit_expr(expr, visitor);
                }
            }
            for table in &select.from {
                visit_table_with_joins(table, visitor);
            }
            for expr in [&select.selection, &select.having, &select.qualify]
                .into_iter()
                .flatten()
            {
                visit_expr(expr, visitor);
            }
            if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
                for expr in exprs {
                    visit_expr(expr, visitor);
                }
            }
        }
        SetExpr::Query(query) => visit_query(query, visitor),
        SetExpr::SetOperation { left, right, .. } => {
            visit_set_expr(left, visitor);
            visit_set_expr(right, visitor);
        }
        SetExpr::Values(values) => {
            for row in &values.rows {
                for expr in row {
                    visit_expr(expr, visitor);
                }
            }
        }
        _ => {}
    }
}

fn visit_table_with_joins<'a, F: FnMut(Reference<'a>)>(table: &'a TableWithJoins, visitor: &mut F) {
    visit_table_factor(&table.relation, visitor);
    for join in &table.joins {
        visit_table_factor(&join.relation, visitor);
        if let Some(JoinConstraint::On(expr)) = join_constraint(&join.join_operator) {
            visit_expr(expr, visitor);
        }
    }
}

fn visit_table_factor<'a, F: FnMut(Reference<'a>)>(factor: &'a TableFactor, visitor: &mut F) {
    match factor {
        TableFactor::Table { name, args, .. } => {
            // `FROM dataset.fn(...)` is a table-valued function call, not a table.
            if args.is_none() {
                visitor(Reference::Relation(name));
            }
        }
        TableFactor::Derived { subquery, .. } => visit_query(subquery, visitor),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => visit_table_with_joins(table_with_joins, visitor),
        TableFactor::UNNEST { array_exprs, .. } => {
            for expr in array_exprs {
                visit_expr(expr, visitor);
            }
        }
        _ => {}
    }
}

/// The constraint of a join, if its operator carries one.
pub(crate) fn join_constraint(op: &JoinOperator) -> Option<&JoinConstraint> {
    match op {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::CrossJoin(c)
        | JoinOperator::Semi(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::Anti(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c)
        | JoinOperator::StraightJoin(c) => Some(c),
        JoinOperator::AsOf { constraint, .. } => Some(constraint),
        JoinOperator::CrossApply | JoinOperator::OuterApply => None,
    }
}

fn visit_expr<'a, F: FnMut(Reference<'a>)>(expr: &'a Expr, visitor: &mut F) {
    match expr {
        Expr::BinaryOp { left, right, .. }
        | Expr::AnyOp { left, right, .. }
        | Expr::AllOp { left, right, .. } => {
            visit_expr(left, visitor);
            visit_expr(right, visitor);
        }
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::Cast { expr: inner, .. }
        | Expr::Extract { expr: inner, .. }
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotFalse(inner) => visit_expr(inner, visitor),
        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            visit_expr(expr, visitor);
            visit_expr(pattern, visitor);
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                visit_expr(operand, visitor);
            }
            for case_when in conditions {
                visit_expr(&case_when.condition, visitor);
                visit_expr(&case_when.result, visitor);
            }
            if let Some(else_result) = else_result {
                visit_expr(else_result, visitor);
            }
        }
        Expr::Function(func) => {
            visitor(Reference::Function(func));
            match &func.args {
                FunctionArguments::Subquery(query) => visit_query(query, visitor),
                FunctionArguments::List(arg_list) => {
                    for arg in &arg_list.args {
                        if let Some(expr) = function_arg_expr(arg) {
                            visit_expr(expr, visitor);
                        }
                    }
                }
                FunctionArguments::None => {}
            }
        }
        Expr::InSubquery {
            expr: inner,
            subquery,
            ..
        } => {
            visit_expr(inner, visitor);
            visit_query(subquery, visitor);
        }
        Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => visit_query(subquery, visitor),
        Expr::Between {
            expr, low, high, ..
        } => {
            visit_expr(expr, visitor);
            visit_expr(low, visitor);
            visit_expr(high, visitor);
        }
        Expr::InList { expr, list, .. } => {
            visit_expr(expr, visitor);
            for item in list {
                visit_expr(item, visitor);
            }
        }
        Expr::Tuple(exprs) => {
            for item in exprs {
                visit_expr(item, visitor);
            }
        }
        _ => {}
    }
}

/// The expression passed as a function argument, if it is one.
pub(crate) fn function_arg_expr(arg: &FunctionArg) -> Option<&Expr> {
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
        | FunctionArg::Named {
            arg: FunctionArgExpr::Expr(expr),
            ..
        }
        | FunctionArg::ExprNamed {
            arg: FunctionArgExpr::Expr(expr),
            ..
        } => Some(expr),
        _ => None,
    }
}
