use super::{exit_codes, open_context};
use crate::cli::args::AskArgs;
use querygate_core::pipeline::{GenerateRequest, Pipeline, PlanSource};

pub async fn run(args: AskArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    let plans = plan_source(args.plan_conn.as_deref()).await?;

    let mut pipeline = Pipeline::new(&ctx);
    if let Some(p) = plans.as_deref() {
        pipeline = pipeline.with_plan_source(p);
    }

    let req = GenerateRequest {
        data_source_id: args.data_source.clone(),
        question: args.question.clone(),
        provider: args.provider.clone(),
        model: args.model.clone(),
        max_rows: args.max_rows,
    };
    let outcome = pipeline.generate(&req).await?;

    if let Some(err) = &outcome.provider_error {
        eprintln!("note: provider failed, answered by {}: {}", outcome.provider, err);
    }
    if args.format == "text" {
        super::check::print_text(&outcome.candidate);
    } else {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(if outcome.accepted() {
        exit_codes::OK
    } else {
        exit_codes::REJECTED
    })
}

#[cfg(feature = "postgres")]
async fn plan_source(conn: Option<&str>) -> anyhow::Result<Option<Box<dyn PlanSource>>> {
    use querygate_core::bench::oracle::postgres::PgReference;
    match conn {
        Some(url) => Ok(Some(Box::new(PgReference::connect(url).await?))),
        None => Ok(None),
    }
}

#[cfg(not(feature = "postgres"))]
async fn plan_source(conn: Option<&str>) -> anyhow::Result<Option<Box<dyn PlanSource>>> {
    if conn.is_some() {
        anyhow::bail!("--plan-conn requires a build with the postgres feature");
    }
    Ok(None)
}
