//! `tg-cli reminder`: replay a watch session on virtual time.

use tg_core::dom::{Dom, MemoryDom};
use tg_core::reminder::PROMPT_ID;
use tg_core::{EngineConfig, ReminderState, Simulation};

use crate::PromptChoice;

const STEP_MS: u64 = 1000;

fn clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn click(sim: &mut Simulation, action: &str) -> Result<(), String> {
    let css = format!("#{} button[data-action=\"{}\"]", PROMPT_ID, action);
    let button = sim
        .dom()
        .select(&css)
        .first()
        .copied()
        .ok_or_else(|| format!("Prompt has no '{}' button", action))?;
    sim.fire(button, tg_core::DomEvent::Click);
    Ok(())
}

pub fn cmd_reminder(
    interval: i64,
    minutes: u64,
    pause_at: Option<u64>,
    pause_secs: u64,
    on_prompt: PromptChoice,
) -> Result<(), String> {
    let mut sim = Simulation::new(MemoryDom::new("/"), EngineConfig::default()).map_err(|e| e.to_string())?;
    let body = sim.dom().body_id();
    let video = sim.dom_mut().append(body, "video", &[("class", "html5-main-video")]);
    sim.start();

    sim.send(&format!(r#"{{"action": "updateTimerInterval", "interval": {}}}"#, interval));
    let stored = sim.engine().flags().reminder_interval_minutes();
    println!("Reminder interval: {} minute(s)", stored);

    sim.navigate("/watch?v=timeline");
    sim.dom_mut().user_play(video);
    sim.pump();

    let pause_start = pause_at.map(|minute| minute * 60_000);
    let pause_end = pause_start.map(|start| start + pause_secs * 1000);
    let end = minutes * 60_000;

    let mut state = sim.engine().reminder_state();
    let mut prompts = 0;
    println!("[{}] {:?}", clock(sim.now()), state);

    while sim.now() < end {
        sim.advance(STEP_MS);
        let now = sim.now();

        if pause_start == Some(now) {
            println!("[{}] viewer pauses", clock(now));
            sim.dom_mut().pause(&video);
            sim.pump();
        }
        if pause_end == Some(now) {
            println!("[{}] viewer resumes", clock(now));
            sim.dom_mut().user_play(video);
            sim.pump();
        }

        let current = sim.engine().reminder_state();
        if current == state {
            continue;
        }
        println!("[{}] {:?} -> {:?}", clock(now), state, current);
        state = current;

        if current == ReminderState::PromptShown && sim.dom().element_by_id(PROMPT_ID).is_some() {
            prompts += 1;
            match on_prompt {
                PromptChoice::Continue => {
                    click(&mut sim, "continue")?;
                    sim.dom_mut().user_play(video);
                    sim.pump();
                }
                PromptChoice::Close => click(&mut sim, "close")?,
                PromptChoice::Break => click(&mut sim, "break")?,
                PromptChoice::Ignore => continue,
            }
            let after = sim.engine().reminder_state();
            println!("[{}] viewer chose {:?}: {:?}", clock(now), on_prompt, after);
            state = after;
        }
    }

    println!();
    println!("Prompts shown: {}", prompts);
    println!("Final state:   {:?}", sim.engine().reminder_state());
    Ok(())
}
