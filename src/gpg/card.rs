//! OpenPGP smartcard operations: status probe, applet reset, key transfer and
//! touch policy.

use super::dialogue::{Dialogue, Reply, Session};
use crate::config::TouchPolicy;
use crate::error::{ProvisionError, Result};
use crate::prompts::{Prompter, gate};
use crate::runner::{CommandRunner, ToolCommand};
use crate::{info, success, warn};

/// OpenPGP card key slots, in the order sub-keys are created and moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSlot {
    Signature,
    Encryption,
    Authentication,
}

impl CardSlot {
    pub const ALL: [CardSlot; 3] = [Self::Signature, Self::Encryption, Self::Authentication];

    /// Answer to gpg's "Please select where to store the key" prompt.
    #[must_use]
    pub fn storage_choice(&self) -> &'static str {
        match self {
            Self::Signature => "1",
            Self::Encryption => "2",
            Self::Authentication => "3",
        }
    }

    /// Usage flag for `gpg --quick-add-key`.
    #[must_use]
    pub fn gpg_usage(&self) -> &'static str {
        match self {
            Self::Signature => "sign",
            Self::Encryption => "encr",
            Self::Authentication => "auth",
        }
    }

    /// Key name for `ykman openpgp keys set-touch`.
    #[must_use]
    pub fn ykman_key(&self) -> &'static str {
        match self {
            Self::Signature => "sig",
            Self::Encryption => "enc",
            Self::Authentication => "aut",
        }
    }
}

/// Probe for an inserted OpenPGP card; absence is `NoTokenDetected`.
pub async fn card_status(runner: &dyn CommandRunner) -> Result<String> {
    let output = runner
        .capture(&ToolCommand::new("gpg").arg("--card-status"))
        .await?;
    if !output.success() {
        return Err(ProvisionError::NoTokenDetected(output.stderr.trim().to_string()));
    }
    Ok(output.stdout)
}

/// Wipe the token's OpenPGP applet after confirmation.
pub async fn reset_openpgp(runner: &dyn CommandRunner, prompter: &mut dyn Prompter) -> Result<()> {
    warn!("Resetting the OpenPGP applet deletes every OpenPGP key stored on the YubiKey");
    gate(prompter, "Reset the OpenPGP applet on your YubiKey?")?;

    runner
        .capture(&ToolCommand::new("ykman").args(["openpgp", "reset", "--force"]))
        .await?
        .into_checked("ykman")?;

    success!("OpenPGP applet reset");
    println!("   PIN is now 123456 and Admin PIN 12345678");
    println!("   Change them afterwards with: ykman openpgp access change-pin / change-admin-pin");
    Ok(())
}

/// The card-edit script moving sub-keys 1..=3 into their matching slots.
///
/// Sub-key `n` is selected, moved, then deselected so the next `key n+1`
/// selects exactly one key. A slot that already holds a key triggers gpg's
/// replace question, which goes to the user.
#[must_use]
pub fn keytocard_dialogue() -> Dialogue {
    let mut dialogue = Dialogue::new("gpg").interject(
        "cardedit.genkeys.replace_key",
        Reply::Confirm("The YubiKey already holds a key in this slot. Replace it?".to_string()),
    );

    for (index, slot) in CardSlot::ALL.iter().enumerate() {
        let select = format!("key {}", index + 1);
        dialogue = dialogue
            .step("keyedit.prompt", Reply::line(select.clone()))
            .step("keyedit.prompt", Reply::line("keytocard"))
            .step(
                "cardedit.genkeys.storekeytype",
                Reply::line(slot.storage_choice()),
            )
            .step("keyedit.prompt", Reply::line(select));
    }

    dialogue.step("keyedit.prompt", Reply::line("save"))
}

/// Move the signature, encryption and authentication sub-keys of `key_id` onto the card.
pub async fn move_subkeys_to_card(
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
    key_id: &str,
) -> Result<()> {
    info!("Moving sub-keys to the YubiKey; enter your key passphrase and Admin PIN when asked");

    let command = ToolCommand::new("gpg")
        .args(["--command-fd", "0", "--status-fd", "1", "--edit-key"])
        .arg(key_id);
    let mut dialogue = keytocard_dialogue();
    let output = {
        let mut session = Session {
            dialogue: &mut dialogue,
            prompter,
        };
        runner.converse(&command, &mut session).await?
    };

    output.into_checked("gpg")?;
    dialogue.finish()?;

    success!("Signature, encryption and authentication keys stored on the YubiKey");
    Ok(())
}

/// Apply `policy` to every OpenPGP slot.
pub async fn apply_touch_policy(runner: &dyn CommandRunner, policy: TouchPolicy) -> Result<()> {
    for slot in CardSlot::ALL {
        let command = ToolCommand::new("ykman")
            .args(["openpgp", "keys", "set-touch", slot.ykman_key(), policy.as_ykman_arg()])
            .arg("--force");
        runner.interactive(&command).await?.into_checked("ykman")?;
    }
    success!("Touch policy '{}' applied", policy.as_ykman_arg());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ToolOutput;
    use crate::testing::{FakeRunner, ScriptedPrompter, expect_err};

    const PROMPT: &str = "[GNUPG:] GET_LINE keyedit.prompt";
    const STORE: &str = "[GNUPG:] GET_LINE cardedit.genkeys.storekeytype";

    fn happy_transcript() -> Vec<&'static str> {
        let mut lines = vec!["[GNUPG:] KEY_CONSIDERED 4AEE18F83AFDEB23E1D2B5A03AA5C34371567BD2 0"];
        for _ in 0..3 {
            lines.extend([PROMPT, PROMPT, "[GNUPG:] PINENTRY_LAUNCHED 1234", STORE, "[GNUPG:] SC_OP_SUCCESS", PROMPT]);
        }
        lines.push(PROMPT);
        lines
    }

    #[tokio::test]
    async fn missing_card_is_no_token_detected() {
        let runner = FakeRunner::new().on(
            "gpg --card-status",
            ToolOutput::failed(2, "gpg: selecting card failed: No such device\n"),
        );
        let err = expect_err(card_status(&runner).await);
        assert!(matches!(err, ProvisionError::NoTokenDetected(msg) if msg.contains("No such device")));
    }

    #[tokio::test]
    async fn transfer_sends_the_scripted_replies() {
        let runner = FakeRunner::new().converse_with(
            "--edit-key",
            &happy_transcript(),
            ToolOutput::ok(""),
        );
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

        move_subkeys_to_card(&runner, &mut prompter, "3AA5C34371567BD2")
            .await
            .unwrap();

        assert_eq!(
            runner.replies(),
            [
                "key 1", "keytocard", "1", "key 1", "key 2", "keytocard", "2", "key 2", "key 3",
                "keytocard", "3", "key 3", "save"
            ]
        );
        assert_eq!(
            runner.calls(),
            ["gpg --command-fd 0 --status-fd 1 --edit-key 3AA5C34371567BD2"]
        );
    }

    #[tokio::test]
    async fn occupied_slot_asks_before_replacing() {
        let mut transcript = happy_transcript();
        transcript.insert(4, "[GNUPG:] GET_BOOL cardedit.genkeys.replace_key");
        let runner = FakeRunner::new().converse_with("--edit-key", &transcript, ToolOutput::ok(""));
        let mut prompter = ScriptedPrompter::new(["no"]);

        let err = expect_err(move_subkeys_to_card(&runner, &mut prompter, "ABCD").await);

        assert!(matches!(err, ProvisionError::UserAborted(_)));
        assert_eq!(runner.replies(), ["key 1", "keytocard"]);
    }

    #[tokio::test]
    async fn session_ending_early_is_a_mismatch() {
        let runner = FakeRunner::new().converse_with("--edit-key", &[PROMPT, PROMPT], ToolOutput::ok(""));
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

        let err = expect_err(move_subkeys_to_card(&runner, &mut prompter, "ABCD").await);

        assert!(matches!(err, ProvisionError::DialogueMismatch { .. }));
    }

    #[tokio::test]
    async fn gpg_exit_failure_wins_over_incomplete_script() {
        let runner = FakeRunner::new().converse_with("--edit-key", &[PROMPT], ToolOutput::failed(2, ""));
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

        let err = expect_err(move_subkeys_to_card(&runner, &mut prompter, "ABCD").await);

        assert!(matches!(err, ProvisionError::ExternalToolFailure { .. }));
    }

    #[tokio::test]
    async fn reset_requires_confirmation() {
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["nope"]);

        let err = expect_err(reset_openpgp(&runner, &mut prompter).await);

        assert!(matches!(err, ProvisionError::UserAborted(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn touch_policy_covers_all_slots() {
        let runner = FakeRunner::new();
        apply_touch_policy(&runner, TouchPolicy::Cached).await.unwrap();
        assert_eq!(
            runner.calls(),
            [
                "ykman openpgp keys set-touch sig cached --force",
                "ykman openpgp keys set-touch enc cached --force",
                "ykman openpgp keys set-touch aut cached --force",
            ]
        );
    }
}
