use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "modules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub slug: String,

    pub name: String,
    pub short_description: String,
    pub description: String,
    pub author: String,
    pub category: String,
    pub license: String,

    /// JSON array of Android version strings
    pub android_versions: String,

    /// JSON array of root method names
    pub root_methods: String,

    /// JSON array of feature bullet points
    pub features: String,

    pub source_url: String,
    pub icon_url: Option<String>,
    pub is_open_source: bool,
    pub is_published: bool,

    /// `pending`, `approved` or `declined`
    pub status: String,

    pub is_featured: bool,
    pub is_recommended: bool,

    /// JSON array of `{kind, message}` objects
    pub warnings: String,

    pub submitted_by: Option<i32>,
    pub reviewed_by: Option<i32>,
    pub review_notes: Option<String>,

    pub created_at: String,
    pub updated_at: String,

    /// Bumped whenever a new release lands.
    pub last_updated: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SubmittedBy",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Submitter,
    #[sea_orm(has_many = "super::releases::Entity")]
    Releases,
    #[sea_orm(has_many = "super::ratings::Entity")]
    Ratings,
    #[sea_orm(has_one = "super::module_github_sync::Entity")]
    GithubSync,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submitter.def()
    }
}

impl Related<super::releases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Releases.def()
    }
}

impl Related<super::ratings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ratings.def()
    }
}

impl Related<super::module_github_sync::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GithubSync.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
