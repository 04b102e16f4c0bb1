pub mod category_dto;

pub use category_dto::{
    CategoryListQuery, CategoryResponseDto, CategoryTreeDto, CategoryTreeQuery,
    CreateCategoryDto, DeleteCategoryQuery, DeleteCategoryResponseDto, DeleteStrategy,
    RenderedTreeDto, ReorderCategoryDto, ReparentCategoryDto, SortDirection, SortKey,
    UpdateCategoryDto,
};
