pub mod migrations;
pub mod relations;
pub mod rows;
pub mod sea_orm_repo;
