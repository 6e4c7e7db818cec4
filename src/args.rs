use clap::{Parser, Subcommand};

/// Hosts the "stars of the sprint" nomination poll.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration file. See the manual for the options.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (file path, optional) The JSON file holding the roster and the polls. Setting this option
    /// overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser, global = true)]
    pub data: Option<String>,

    /// (YYYY-MM-DD, default today) The day of the poll.
    #[clap(long, value_parser, global = true)]
    pub day: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Prints the roster.
    Roster,
    /// Replaces the roster. Names may also be separated with commas.
    SetRoster {
        #[clap(value_parser, required = true)]
        names: Vec<String>,
    },
    /// Replaces the roster with the names of a .csv, .xlsx or text file.
    ImportRoster {
        #[clap(value_parser)]
        path: String,
        /// (default: the first worksheet) When using an Excel file, the name of the worksheet.
        #[clap(long, value_parser)]
        worksheet: Option<String>,
    },
    /// Prints the state of the poll.
    Status,
    /// Names the poll of the day.
    Name {
        #[clap(value_parser)]
        name: String,
    },
    /// Opens the poll to nominations.
    Open,
    /// Closes the poll. The results can then be revealed.
    Close,
    /// Forgets the poll of the day.
    Reset,
    /// Nominates one or more stars.
    Nominate {
        /// Your name.
        #[clap(long, value_parser)]
        nominator: String,
        /// A member you nominate. Repeat the option to nominate several members.
        #[clap(long = "nominee", value_parser, required = true)]
        nominees: Vec<String>,
        /// (optional) Why you nominate them: either no feedback at all, or one per nominee, in
        /// the same order. An empty string means no feedback.
        #[clap(long = "feedback", value_parser)]
        feedbacks: Vec<String>,
        /// Hides your name next to your feedback.
        #[clap(long, takes_value = false)]
        anonymous: bool,
    },
    /// Does not take part in the poll of the day.
    Decline {
        #[clap(value_parser)]
        name: String,
    },
    /// Lists the members who did not take part yet.
    Pending,
    /// Tells whether a member already nominated someone.
    HasNominated {
        #[clap(value_parser)]
        name: String,
    },
    /// Prints how many members took part.
    Progress,
    /// Prints the data of the progress chart. The names only appear once the poll is closed.
    Chart,
    /// Reveals the results of a closed poll.
    Results {
        /// (json or markdown, default json) The output format.
        #[clap(long, value_parser)]
        format: Option<String>,
        /// (file path) A reference file containing the results in JSON format. If provided, the
        /// results are checked against it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
}
