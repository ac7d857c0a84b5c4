//! SETTINGS

use tracing::info;

use crate::datetime::DateFormat;
use crate::engine::params::BlockParams;
use crate::error::TsResult;

use super::{BlockCommand, Session};

/// Date format selection; the run context itself is read by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub date_format: Option<DateFormat>,
}

impl BlockCommand for Settings {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let date_format = params
            .opt_text("date_format")
            .map(DateFormat::from_setting)
            .transpose()?;
        Ok(Self { date_format })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        if let Some(format) = self.date_format {
            info!(pattern = %format.pattern, "date format set");
            session.date_format = format;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_types::ParamValue;

    #[test]
    fn test_date_format_applied() {
        let params = BlockParams::from_pairs(
            "SETTINGS",
            1,
            [("date_format", ParamValue::scalar("dd/mm/yyyy"))],
        );
        let settings = Settings::from_params(&params, &DateFormat::default()).unwrap();
        let mut session = Session::new(".");
        settings.execute(&mut session).unwrap();
        assert!(session.date_format.day_first);
        assert_eq!(session.date_format.pattern, "%d/%m/%Y");
    }

    #[test]
    fn test_bad_format_rejected_at_build() {
        let params =
            BlockParams::from_pairs("SETTINGS", 1, [("date_format", ParamValue::scalar("yyyy"))]);
        assert!(Settings::from_params(&params, &DateFormat::default()).is_err());
    }
}
