#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(f64),
    Variable(String),
    Binary(char, Box<Expression>, Box<Expression>),
    Call(String, Vec<Expression>),
}

impl Expression {
    pub fn binary(op: char, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expression,
}

/// One top-level unit, as handed from the parser to the code generator.
#[derive(Debug, PartialEq, Clone)]
pub enum ASTNode {
    Extern(Prototype),
    Function(Function),
    /// A bare expression wrapped in an anonymous nullary function.
    TopLevelExpression(Function),
}

impl ASTNode {
    pub fn name(&self) -> &str {
        match self {
            ASTNode::Extern(proto) => &proto.name,
            ASTNode::Function(func) | ASTNode::TopLevelExpression(func) => &func.prototype.name,
        }
    }
}
