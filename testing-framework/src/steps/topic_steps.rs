//! Consensus topic steps

use anyhow::{bail, ensure, Context, Result};

use super::{fund_above, StepArgs, StepError, StepRegistry};
use crate::{fixture::ScenarioWorld, keys::Key, keys::ThresholdKey, services::topic};

pub fn register(registry: &mut StepRegistry) -> Result<(), StepError> {
    registry
        .register(r"a first account with more than (\d+) hbars", |world, args| {
            Box::pin(funded_account(world, args, 1))
        })?
        .register(r"A second account with more than (\d+) hbars", |world, args| {
            Box::pin(funded_account(world, args, 2))
        })?
        .register(
            r#"A topic is created with the memo "([^"]*)" with the first account as the submit key"#,
            |world, args| Box::pin(topic_with_account_key(world, args)),
        )?
        .register(r"A (\d+) of (\d+) threshold key with the first and second account", |world, args| {
            Box::pin(threshold_key(world, args))
        })?
        .register(
            r#"A topic is created with the memo "([^"]*)" with the threshold key as the submit key"#,
            |world, args| Box::pin(topic_with_threshold_key(world, args)),
        )?
        .register(r#"The message "([^"]*)" is published to the topic"#, |world, args| {
            Box::pin(publish(world, args))
        })?
        .register(
            r#"The message "([^"]*)" is received by the topic and can be printed to the console"#,
            |world, args| Box::pin(received(world, args)),
        )?
        .register(r#"The topic has the memo "([^"]*)""#, |world, args| {
            Box::pin(topic_memo(world, args))
        })?;
    Ok(())
}

async fn funded_account(world: &mut ScenarioWorld, args: StepArgs, index: usize) -> Result<()> {
    let hbars = args.int(0)?;
    fund_above(world, index, hbars).await
}

async fn topic_with_account_key(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let memo = args.str(0)?;
    let first = world.use_operator(1)?;
    let topic_id = topic::create_topic(&world.client, memo, Some(Key::from(first.public_key())))
        .await
        .context("creating topic with the first account as submit key")?;
    world.topic_id = Some(topic_id);
    Ok(())
}

async fn threshold_key(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let threshold: usize = args.int(0)?;
    let total: usize = args.int(1)?;
    let members = vec![world.account(1)?.public_key(), world.account(2)?.public_key()];
    ensure!(
        total == members.len(),
        "a {} of {} key needs {} members, the step names {}",
        threshold,
        total,
        total,
        members.len()
    );

    let key = ThresholdKey::new(members, threshold)?;
    log::info!("Threshold key: {}", key);
    world.threshold_key = Some(key);
    Ok(())
}

async fn topic_with_threshold_key(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let memo = args.str(0)?;
    let key = world
        .threshold_key
        .clone()
        .context("no threshold key has been defined in this scenario")?;
    world.use_operator(1)?;
    let topic_id = topic::create_topic(&world.client, memo, Some(Key::Threshold(key)))
        .await
        .context("creating topic with the threshold submit key")?;
    world.topic_id = Some(topic_id);
    Ok(())
}

async fn publish(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let message = args.str(0)?;
    let topic_id = world.topic_id()?;

    // Subscribe first so the message cannot slip past the observer
    if world.observer.topic_id() != Some(topic_id) {
        world.observer.subscribe(&world.client, &topic_id).await?;
    }

    let receipt = topic::submit_message(&world.client, &topic_id, message, &world.pool)
        .await
        .with_context(|| format!("publishing {:?} to topic {}", message, topic_id))?;
    world.last_transaction_id = Some(receipt.transaction_id);
    world.last_receipt = Some(receipt);
    Ok(())
}

async fn received(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let expected = args.str(0)?;
    let sequence_number = world
        .last_receipt
        .as_ref()
        .and_then(|receipt| receipt.topic_sequence_number)
        .context("no message has been published in this scenario")?;
    let wanted = usize::try_from(sequence_number)?;

    let observation = world
        .observer
        .await_messages(wanted, world.settings.observation_window)
        .await?;
    if observation.timed_out {
        bail!(
            "received {} of {} messages within {:?}",
            observation.messages.len(),
            wanted,
            observation.waited
        );
    }

    let last = observation.last_text().unwrap_or_default();
    ensure!(
        last == expected,
        "last message on the topic is {:?}, expected {:?}",
        last,
        expected
    );
    println!("{}", last);
    Ok(())
}

async fn topic_memo(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let expected = args.str(0)?;
    let info = topic::topic_info(&world.client, &world.topic_id()?).await?;
    ensure!(
        info.memo == expected,
        "topic memo is {:?}, expected {:?}",
        info.memo,
        expected
    );
    Ok(())
}
