use anyhow::Result;

use kcal_core::models::DEFAULT_CALORIE_GOAL;
use kcal_core::service::Tracker;

pub(crate) fn cmd_goal_set(tracker: &Tracker, calories: f64, json: bool) -> Result<()> {
    let goal = tracker.set_goal(calories)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        let cal = goal.calorie_goal;
        println!("Daily goal: {cal:.0} kcal");
    }
    Ok(())
}

pub(crate) fn cmd_goal_show(tracker: &Tracker, json: bool) -> Result<()> {
    let goal = tracker.goal()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        let cal = goal.calorie_goal;
        print!("Daily goal: {cal:.0} kcal");
        if (cal - DEFAULT_CALORIE_GOAL).abs() < f64::EPSILON {
            print!(" (default)");
        }
        println!();
    }
    Ok(())
}

pub(crate) fn cmd_goal_clear(tracker: &Tracker, json: bool) -> Result<()> {
    let cleared = tracker.clear_goal()?;

    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else if cleared {
        println!("Goal cleared, back to {DEFAULT_CALORIE_GOAL:.0} kcal");
    } else {
        eprintln!("No goal was set");
    }
    Ok(())
}
