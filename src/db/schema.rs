//! Schema bootstrap: creates every table that does not exist yet, in foreign-key order.

use sea_orm::sea_query::{Expr, Index};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::db::entities::{
    auth_token, favorite, ingredient, recipe, recipe_ingredient, recipe_tag, shopping_cart,
    subscription, tag, user,
};

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}

pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, tag::Entity).await?;
    create_table(db, &schema, ingredient::Entity).await?;
    create_table(db, &schema, recipe::Entity).await?;
    create_table(db, &schema, recipe_tag::Entity).await?;
    create_table(db, &schema, recipe_ingredient::Entity).await?;
    create_table(db, &schema, favorite::Entity).await?;
    create_table(db, &schema, shopping_cart::Entity).await?;
    create_table(db, &schema, auth_token::Entity).await?;

    // A user can never follow themselves, whatever the caller checked beforehand.
    let mut subscriptions = schema.create_table_from_entity(subscription::Entity);
    subscriptions
        .if_not_exists()
        .check(Expr::col(subscription::Column::UserId).ne(Expr::col(subscription::Column::AuthorId)));
    db.execute(backend.build(&subscriptions)).await?;

    let ingredient_unit_index = Index::create()
        .name("idx_ingredients_name_unit")
        .table(ingredient::Entity)
        .col(ingredient::Column::Name)
        .col(ingredient::Column::MeasurementUnit)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&ingredient_unit_index)).await?;

    info!("Database schema is up to date.");
    Ok(())
}
