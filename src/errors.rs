use std::fmt;

#[derive(Debug, Clone)]
pub enum LinkvaultError {
    InvalidRequest(String),
    CodeConflict(String),
    NotFound(String),
    Gone(String),
    Exhausted(String),
    Empty(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Serialization(String),
}

impl LinkvaultError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkvaultError::InvalidRequest(_) => "E001",
            LinkvaultError::CodeConflict(_) => "E002",
            LinkvaultError::NotFound(_) => "E003",
            LinkvaultError::Gone(_) => "E004",
            LinkvaultError::Exhausted(_) => "E005",
            LinkvaultError::Empty(_) => "E006",
            LinkvaultError::DatabaseConfig(_) => "E007",
            LinkvaultError::DatabaseConnection(_) => "E008",
            LinkvaultError::DatabaseOperation(_) => "E009",
            LinkvaultError::FileOperation(_) => "E010",
            LinkvaultError::Serialization(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkvaultError::InvalidRequest(_) => "Invalid Request",
            LinkvaultError::CodeConflict(_) => "Short Code Conflict",
            LinkvaultError::NotFound(_) => "Resource Not Found",
            LinkvaultError::Gone(_) => "Resource Gone",
            LinkvaultError::Exhausted(_) => "Retry Budget Exhausted",
            LinkvaultError::Empty(_) => "Empty Request",
            LinkvaultError::DatabaseConfig(_) => "Database Configuration Error",
            LinkvaultError::DatabaseConnection(_) => "Database Connection Error",
            LinkvaultError::DatabaseOperation(_) => "Database Operation Error",
            LinkvaultError::FileOperation(_) => "File Operation Error",
            LinkvaultError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkvaultError::InvalidRequest(msg) => msg,
            LinkvaultError::CodeConflict(msg) => msg,
            LinkvaultError::NotFound(msg) => msg,
            LinkvaultError::Gone(msg) => msg,
            LinkvaultError::Exhausted(msg) => msg,
            LinkvaultError::Empty(msg) => msg,
            LinkvaultError::DatabaseConfig(msg) => msg,
            LinkvaultError::DatabaseConnection(msg) => msg,
            LinkvaultError::DatabaseOperation(msg) => msg,
            LinkvaultError::FileOperation(msg) => msg,
            LinkvaultError::Serialization(msg) => msg,
        }
    }

    /// 短码已被占用，调用方应换一个新短码后重试
    pub fn is_code_conflict(&self) -> bool {
        matches!(self, LinkvaultError::CodeConflict(_))
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkvaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 默认使用简洁格式
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkvaultError {}

// 便捷的构造函数
impl LinkvaultError {
    pub fn invalid_request<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::InvalidRequest(msg.into())
    }

    pub fn code_conflict<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::CodeConflict(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::NotFound(msg.into())
    }

    pub fn gone<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::Gone(msg.into())
    }

    pub fn exhausted<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::Exhausted(msg.into())
    }

    pub fn empty<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::Empty(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::Serialization(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for LinkvaultError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkvaultError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for LinkvaultError {
    fn from(err: std::io::Error) -> Self {
        LinkvaultError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkvaultError {
    fn from(err: serde_json::Error) -> Self {
        LinkvaultError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkvaultError>;
