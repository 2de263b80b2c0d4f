use clap::Parser;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum SfsCli {
    /// create a new file system image
    Mkfs(MkfsArgs),
    /// list a directory, or show one entry
    Ls(TargetArgs),
    /// print the content of a file
    Cat(TargetArgs),
    /// copy a host file into the image
    Put(PutArgs),
    /// create a directory
    Mkdir(TargetArgs),
    /// remove a file or an empty directory
    Rm(TargetArgs),
    /// show the attributes of an entry, and volume usage for `/`
    Stat(TargetArgs),
}
///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the number of data blocks after the inode table
    #[clap(short, long, default_value_t = 100)]
    pub data_blocks: u64,
}

/// subcommands working on one path inside the image
#[derive(clap::Args, Debug, PartialEq)]
pub struct TargetArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// an absolute path inside the image
    #[clap(short, long, default_value = "/")]
    pub target: String,
    /// mount with the behavior of the first sfs driver
    #[clap(long)]
    pub legacy: bool,
}

/// copy a host file subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "copy a host file into the image")]
pub struct PutArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the file to write inside the image, created when missing
    #[clap(short, long)]
    pub target: String,
    /// the host file to copy
    #[clap(short, long)]
    pub source: String,
    /// where to start writing in the target
    #[clap(short, long, default_value_t = 0)]
    pub offset: u64,
    /// mount with the behavior of the first sfs driver
    #[clap(long)]
    pub legacy: bool,
}

/// test the `SfsCli` struct
/// test `mkfs` subcommand
#[cfg(test)]
mod mkfs_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = SfsCli::parse_from(["sfs", "mkfs", "-p", "test", "-d", "30"]);
        assert_eq!(
            args,
            SfsCli::Mkfs(MkfsArgs {
                image_file_path: "test".to_string(),
                data_blocks: 30,
            })
        );
    }
    /// test long parameter form
    #[test]
    fn test_long_parameter_form() {
        let image_file_path_name = concat!("--", "image-file-path");
        let args = SfsCli::parse_from([
            "sfs",
            "mkfs",
            image_file_path_name,
            "test",
            "--data-blocks",
            "30",
        ]);
        assert_eq!(
            args,
            SfsCli::Mkfs(MkfsArgs {
                image_file_path: "test".to_string(),
                data_blocks: 30,
            })
        );
    }
    #[test]
    fn test_default_data_blocks() {
        let args = SfsCli::parse_from(["sfs", "mkfs", "-p", "test"]);
        assert_eq!(
            args,
            SfsCli::Mkfs(MkfsArgs {
                image_file_path: "test".to_string(),
                data_blocks: 100,
            })
        );
    }
}
