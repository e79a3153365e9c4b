pub mod detach;
pub mod text;
